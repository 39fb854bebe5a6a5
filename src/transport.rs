use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::Client;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;

use crate::{
    chat::{Attachment, FileReference},
    config::ServiceConfig,
    errors::{AiError, AiResult},
};

/// Raw text lines of a streamed response body
pub type LineStream = BoxStream<'static, AiResult<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An outbound request, fully resolved by the adapter layer
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Whole exchange for `send`; only the wait for headers for `open_stream`
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs HTTP exchanges on behalf of the façade.
///
/// Timeouts, retries and connection pooling are the implementation's business.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a request and return whatever status and body came back
    async fn send(&self, request: HttpRequest) -> AiResult<HttpResponse>;

    /// Open a streamed request; a non-2xx status is an error
    async fn open_stream(&self, request: HttpRequest) -> AiResult<LineStream>;
}

/// Uploads attachments for vendors that reference files by handle
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(&self, service: &ServiceConfig, attachment: &Attachment) -> AiResult<FileReference>;
}

/// Default transport backed by `reqwest`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> AiResult<Self> {
        // Create HTTP client with connection pooling
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AiError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// `whole_timeout` bounds the entire exchange; streams bound only the wait for headers
    fn builder(&self, request: &HttpRequest, whole_timeout: bool) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let (true, Some(timeout)) = (whole_timeout, request.timeout) {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> AiResult<HttpResponse> {
        let response = self
            .builder(&request, true)
            .send()
            .await
            .map_err(|e| AiError::Transport(format!("Failed to send request to {}: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::Transport(format!("Failed to read response body: {}", e)))?;

        tracing::debug!(url = %request.url, status, bytes = body.len(), "Response received");
        Ok(HttpResponse { status, body })
    }

    async fn open_stream(&self, request: HttpRequest) -> AiResult<LineStream> {
        let pending = self.builder(&request, false).send();
        let response = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                AiError::Transport(format!("No response from {} within {:?}", request.url, limit))
            })?,
            None => pending.await,
        }
        .map_err(|e| AiError::Transport(format!("Failed to open stream to {}: {}", request.url, e)))?;

        // Handle HTTP errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status, &error_body));
        }

        let bytes = response.bytes_stream().map_err(std::io::Error::other);
        let lines = LinesStream::new(StreamReader::new(bytes).lines())
            .map_err(|e| AiError::Transport(format!("Stream interrupted: {}", e)));

        Ok(lines.boxed())
    }
}
