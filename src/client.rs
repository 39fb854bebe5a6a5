use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::{
    chat::{ChatInput, ChatOptions, GeneratedImage, ImageOptions},
    config::{AiConfig, ServiceConfig},
    errors::{AiError, AiResult},
    moderation::{ModerationOptions, ModerationResult},
    providers::{
        ChatAdapter, adapter_for, ensure_chat_capabilities, ensure_moderation_capability, strip_code_fence,
    },
    schema::{self, Described},
    stream::SseEvents,
    transport::{FileUploader, HttpRequest, HttpResponse, ReqwestTransport, Transport},
};

/// The façade over one configured AI service.
///
/// Every call validates capabilities before any traffic, sends one request
/// through the [`Transport`], and hands the reply to the service's adapter.
#[derive(Clone)]
pub struct AiClient {
    service: ServiceConfig,
    adapter: &'static dyn ChatAdapter,
    transport: Arc<dyn Transport>,
    uploader: Option<Arc<dyn FileUploader>>,
}

impl AiClient {
    pub fn new(service: ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            adapter: adapter_for(service.provider),
            service,
            transport,
            uploader: None,
        }
    }

    /// Client for the named service of `config`, over the default reqwest transport.
    ///
    /// Unknown names and invalid services are configuration errors.
    pub fn from_config(config: &AiConfig, name: &str) -> AiResult<Self> {
        let service = config
            .service(name)
            .ok_or_else(|| AiError::Config(format!("Unknown service '{}'", name)))?;
        service
            .validate()
            .map_err(|e| AiError::Config(format!("Service '{}': {:#}", name, e)))?;

        Ok(Self::new(service.clone(), Arc::new(ReqwestTransport::new()?)))
    }

    /// Upload byte documents through `uploader` for vendors that reference files
    pub fn with_uploader(mut self, uploader: Arc<dyn FileUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    pub fn adapter(&self) -> &'static dyn ChatAdapter {
        self.adapter
    }

    fn request(&self, url: String, payload: Value) -> HttpRequest {
        HttpRequest::post(url, payload)
            .headers(self.adapter.request_headers(&self.service))
            .timeout(Duration::from_secs(self.service.timeout_seconds))
    }

    async fn send(&self, request: HttpRequest) -> AiResult<HttpResponse> {
        let url = request.url.clone();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            tracing::warn!(
                provider = %self.service.provider,
                status = response.status,
                url = %url,
                "Vendor returned an error status"
            );
            return Err(AiError::from_status(response.status, &response.body));
        }
        Ok(response)
    }

    /// Replace byte documents by uploaded references where that applies
    async fn prepare_input<'a>(&self, input: &'a ChatInput) -> AiResult<Cow<'a, ChatInput>> {
        let Some(uploader) = &self.uploader else {
            return Ok(Cow::Borrowed(input));
        };
        if input.files().is_empty()
            || !self.adapter.uploads_files()
            || !self.service.capabilities().file_upload
        {
            return Ok(Cow::Borrowed(input));
        }

        let mut files = Vec::with_capacity(input.files().len());
        for file in input.files() {
            if file.reference().is_some() {
                files.push(file.clone());
                continue;
            }
            let handle = uploader.upload(&self.service, file).await?;
            tracing::debug!(file = file.file_name(), id = %handle.id, "Attachment uploaded");
            files.push(file.with_reference(handle.id));
        }
        Ok(Cow::Owned(input.with_files(files)))
    }

    /// Send one chat request and return the reply text
    pub async fn chat(&self, input: &ChatInput, options: &ChatOptions) -> AiResult<String> {
        tracing::info!("Processing chat request for model: {}", self.service.model);

        // Capabilities are checked before uploads, which already hit the network
        ensure_chat_capabilities(&self.service, input, options, false)?;
        let input = self.prepare_input(input).await?;
        let payload = self
            .adapter
            .build_chat_payload(&self.service, &input, options, false)?;
        let response = self
            .send(self.request(self.adapter.chat_url(&self.service, false), payload))
            .await?;

        let text = self.adapter.parse_chat_response(&response.body)?;
        tracing::debug!(chars = text.len(), "Chat request completed");
        Ok(text)
    }

    /// Chat with the reply constrained to the schema of `T`, then decode it
    pub async fn chat_structured<T>(&self, input: &ChatInput, options: &ChatOptions) -> AiResult<T>
    where
        T: Described + DeserializeOwned,
    {
        let schema = schema::build_schema::<T>()?;
        let options = options.to_builder().json_schema(schema).build()?;
        let text = self.chat(input, &options).await?;
        Ok(schema::parse::<T>(strip_code_fence(&text))?)
    }

    /// Stream a chat reply, calling `on_token` for each text fragment in order.
    ///
    /// Returns once the vendor's end marker arrives, or when the stream
    /// closes without one.
    pub async fn chat_stream<F>(&self, input: &ChatInput, options: &ChatOptions, mut on_token: F) -> AiResult<()>
    where
        F: FnMut(&str),
    {
        tracing::info!("Processing streaming chat request for model: {}", self.service.model);

        ensure_chat_capabilities(&self.service, input, options, true)?;
        let input = self.prepare_input(input).await?;
        let payload = self
            .adapter
            .build_chat_payload(&self.service, &input, options, true)?;
        let lines = self
            .transport
            .open_stream(self.request(self.adapter.chat_url(&self.service, true), payload))
            .await?;

        let mut events = SseEvents::new(lines);
        while let Some(event) = events.next().await {
            let event = event?;
            if !self.adapter.process_chat_stream_event(&event, &mut on_token)? {
                tracing::debug!("Stream finished");
                return Ok(());
            }
        }

        tracing::warn!(provider = %self.service.provider, "Stream closed without an end marker");
        Ok(())
    }

    /// Score `content` against the requested moderation categories
    pub async fn moderate(&self, content: &str, options: &ModerationOptions) -> AiResult<ModerationResult> {
        if content.trim().is_empty() {
            return Err(AiError::invalid_input("Content to moderate cannot be blank"));
        }
        ensure_moderation_capability(&self.service)?;

        let payload = self
            .adapter
            .build_moderation_payload(&self.service, content, options)?;
        let response = self
            .send(self.request(self.adapter.moderation_url(&self.service), payload))
            .await?;

        let result = self.adapter.parse_moderation_response(&response.body, options)?;
        if result.is_flagged() {
            tracing::info!(categories = ?result.categories_above_threshold(), "Content flagged");
        }
        Ok(result)
    }

    pub async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> AiResult<GeneratedImage> {
        if prompt.trim().is_empty() {
            return Err(AiError::invalid_input("Image prompt cannot be blank"));
        }

        let payload = self.adapter.build_image_payload(&self.service, prompt, options)?;
        let response = self
            .send(self.request(self.adapter.image_url(&self.service), payload))
            .await?;
        self.adapter.parse_image_response(&response.body, options)
    }

    /// Blocking form of [`AiClient::chat`]
    pub fn chat_blocking(&self, input: &ChatInput, options: &ChatOptions) -> AiResult<String> {
        block_on(self.chat(input, options))?
    }

    pub fn chat_structured_blocking<T>(&self, input: &ChatInput, options: &ChatOptions) -> AiResult<T>
    where
        T: Described + DeserializeOwned,
    {
        block_on(self.chat_structured::<T>(input, options))?
    }

    pub fn chat_stream_blocking<F>(&self, input: &ChatInput, options: &ChatOptions, on_token: F) -> AiResult<()>
    where
        F: FnMut(&str),
    {
        block_on(self.chat_stream(input, options, on_token))?
    }

    pub fn moderate_blocking(&self, content: &str, options: &ModerationOptions) -> AiResult<ModerationResult> {
        block_on(self.moderate(content, options))?
    }

    pub fn generate_image_blocking(&self, prompt: &str, options: &ImageOptions) -> AiResult<GeneratedImage> {
        block_on(self.generate_image(prompt, options))?
    }
}

/// Drive `future` to completion from synchronous code.
///
/// Inside a multi-threaded runtime the current worker is handed over for
/// the duration; outside any runtime a private one is started.
fn block_on<F: Future>(future: F) -> AiResult<F::Output> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => Err(AiError::Config(
            "Blocking calls cannot run on a current-thread runtime; use the async API".to_string(),
        )),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| AiError::Config(format!("Failed to start runtime: {}", e)))?;
            Ok(runtime.block_on(future))
        }
    }
}
