pub mod anthropic;
pub mod gemini;
pub mod meta;
pub mod mistral;
pub mod ollama;
pub mod openai;
pub mod openrouter;
pub mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    chat::{ChatInput, ChatOptions, GeneratedImage, ImageOptions},
    config::{Capabilities, ServiceConfig},
    errors::{AiError, AiResult},
    json_path,
    moderation::{self, ModerationOptions, ModerationResult},
    stream::StreamEvent,
};

// Re-export registry for easier access
pub use registry::adapter_for;

/// Vendor family an adapter speaks for
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai-responses")]
    OpenAiResponses,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "meta")]
    Meta,
    #[serde(rename = "mistral")]
    Mistral,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 8] = [
        ProviderKind::OpenAi,
        ProviderKind::OpenAiResponses,
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::Ollama,
        ProviderKind::OpenRouter,
        ProviderKind::Meta,
        ProviderKind::Mistral,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::OpenAiResponses => "OpenAI Responses",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Google => "Google",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Meta => "Meta",
            ProviderKind::Mistral => "Mistral",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi | ProviderKind::OpenAiResponses => "https://api.openai.com/v1/",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1/",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta/",
            ProviderKind::Ollama => "http://localhost:11434/",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1/",
            ProviderKind::Meta => "https://api.llama.com/v1/",
            ProviderKind::Mistral => "https://api.mistral.ai/v1/",
        }
    }

    pub fn default_capabilities(&self) -> Capabilities {
        let all = Capabilities {
            streaming: true,
            file_upload: true,
            structured_output: true,
            moderation: true,
            image_generation: true,
        };
        match self {
            ProviderKind::OpenAi | ProviderKind::OpenAiResponses | ProviderKind::Google => all,
            ProviderKind::Anthropic | ProviderKind::OpenRouter | ProviderKind::Mistral => Capabilities {
                image_generation: false,
                ..all
            },
            ProviderKind::Ollama | ProviderKind::Meta => Capabilities {
                file_upload: false,
                image_generation: false,
                ..all
            },
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Translates the normalized vocabulary into one vendor's wire format and back.
///
/// Implementations carry no mutable state; one instance serves every call.
pub trait ChatAdapter: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Build the JSON body of a chat request
    fn build_chat_payload(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<Value>;

    /// Extract the reply text of a non-streaming chat response
    fn parse_chat_response(&self, body: &str) -> AiResult<String> {
        let json = parse_response_json(self.provider(), body)?;
        extract_content(self.provider(), &json, self.chat_response_content_paths())
    }

    /// Where the reply text may live, most specific first; never empty
    fn chat_response_content_paths(&self) -> &'static [&'static str];

    /// Handle one streamed event, calling `on_token` for every non-empty
    /// text fragment. Returns `false` once the vendor's end marker is seen.
    fn process_chat_stream_event(
        &self,
        event: &StreamEvent,
        on_token: &mut dyn FnMut(&str),
    ) -> AiResult<bool>;

    fn chat_url(&self, service: &ServiceConfig, streaming: bool) -> String;

    fn request_headers(&self, service: &ServiceConfig) -> Vec<(String, String)>;

    /// Whether byte attachments should be uploaded and sent by reference
    fn uploads_files(&self) -> bool {
        false
    }

    fn moderation_url(&self, service: &ServiceConfig) -> String {
        self.chat_url(service, false)
    }

    fn build_moderation_payload(
        &self,
        service: &ServiceConfig,
        content: &str,
        options: &ModerationOptions,
    ) -> AiResult<Value> {
        structured_moderation_payload(self, service, content, options)
    }

    fn parse_moderation_response(&self, body: &str, options: &ModerationOptions) -> AiResult<ModerationResult> {
        parse_structured_moderation(self, body, options)
    }

    fn image_url(&self, service: &ServiceConfig) -> String {
        self.chat_url(service, false)
    }

    fn build_image_payload(
        &self,
        _service: &ServiceConfig,
        _prompt: &str,
        _options: &ImageOptions,
    ) -> AiResult<Value> {
        Err(AiError::unsupported(
            self.provider().name(),
            "image generation",
            "no image generation surface",
        ))
    }

    fn parse_image_response(&self, _body: &str, _options: &ImageOptions) -> AiResult<GeneratedImage> {
        Err(AiError::unsupported(
            self.provider().name(),
            "image generation",
            "no image generation surface",
        ))
    }
}

/// Fail before any network traffic when the request needs a capability the
/// service lacks.
pub fn ensure_chat_capabilities(
    service: &ServiceConfig,
    input: &ChatInput,
    options: &ChatOptions,
    streaming: bool,
) -> AiResult<()> {
    let capabilities = service.capabilities();
    let provider = service.provider.name();

    if streaming && !capabilities.streaming {
        return Err(AiError::unsupported(
            provider,
            "streaming",
            format!("model '{}' cannot stream responses", service.model),
        ));
    }

    if options.json_schema().is_some() && !capabilities.structured_output {
        return Err(AiError::unsupported(
            provider,
            "structured output",
            format!("model '{}' cannot be constrained by a JSON schema", service.model),
        ));
    }

    let references_files = input.history().iter().any(|turn| !turn.file_refs.is_empty());
    if (!input.files().is_empty() || references_files) && !capabilities.file_upload {
        return Err(AiError::unsupported(
            provider,
            "file upload",
            format!("model '{}' does not accept file attachments", service.model),
        ));
    }

    Ok(())
}

/// Fail before any network traffic when the service cannot moderate
pub fn ensure_moderation_capability(service: &ServiceConfig) -> AiResult<()> {
    if !service.capabilities().moderation {
        return Err(AiError::unsupported(
            service.provider.name(),
            "moderation",
            format!("model '{}' is not configured for moderation", service.model),
        ));
    }
    Ok(())
}

/// Parse a response body and surface an embedded vendor error
pub fn parse_response_json(provider: ProviderKind, body: &str) -> AiResult<Value> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| AiError::malformed(provider.name(), format!("body is not valid JSON: {}", e)))?;

    if let Some(message) = vendor_error_message(&json) {
        tracing::error!(provider = %provider, %message, "Vendor reported an error");
        return Err(AiError::vendor(provider.name(), message));
    }

    Ok(json)
}

/// First non-blank value at any of `paths`, or `MissingContent`
pub fn extract_content(provider: ProviderKind, json: &Value, paths: &[&str]) -> AiResult<String> {
    json_path::first_non_blank(json, paths)?.ok_or_else(|| AiError::MissingContent {
        provider: provider.name().to_string(),
        paths: paths.iter().map(|p| p.to_string()).collect(),
    })
}

/// The error message of a vendor error envelope, if `json` is one.
///
/// Recognises `{"error": {"message": ..}}`, `{"error": "..."}`,
/// `{"type": "error", ...}`, `{"object": "error", "message": ..}` and
/// `{"detail": "..."}`.
pub fn vendor_error_message(json: &Value) -> Option<String> {
    let object = json.as_object()?;

    match object.get("error") {
        Some(Value::String(message)) if !message.trim().is_empty() => return Some(message.clone()),
        Some(error @ Value::Object(_)) => {
            let message = json_path::first_non_blank(error, &["message", "status", "type", "code"])
                .ok()
                .flatten()
                .unwrap_or_else(|| error.to_string());
            return Some(message);
        }
        _ => {}
    }

    if object.get("object").and_then(Value::as_str) == Some("error") {
        return object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(json.to_string()));
    }

    match object.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        _ => None,
    }
}

/// Parse the data of a stream event; unparsable data is logged and skipped
pub(crate) fn stream_json(provider: ProviderKind, data: &str) -> Option<Value> {
    match serde_json::from_str(data) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "Skipping unparsable stream event");
            None
        }
    }
}

/// Forward a fragment unless it is empty; whitespace is a real token
pub(crate) fn emit(on_token: &mut dyn FnMut(&str), text: &str) {
    if !text.is_empty() {
        on_token(text);
    }
}

/// Strip a Markdown code fence some models wrap structured output in
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Moderation through a structured-output chat request
pub fn structured_moderation_payload<A: ChatAdapter + ?Sized>(
    adapter: &A,
    service: &ServiceConfig,
    content: &str,
    options: &ModerationOptions,
) -> AiResult<Value> {
    ensure_moderation_capability(service)?;
    if !service.capabilities().structured_output {
        return Err(AiError::unsupported(
            adapter.provider().name(),
            "moderation",
            "no moderation endpoint and no structured output to emulate one",
        ));
    }

    let input = ChatInput::text(content)?;
    let chat_options = ChatOptions::builder()
        .system_prompt(moderation::moderation_prompt(options))
        .temperature(0.0)
        .json_schema(moderation::moderation_schema(options))
        .build()?;

    adapter.build_chat_payload(service, &input, &chat_options, false)
}

pub fn parse_structured_moderation<A: ChatAdapter + ?Sized>(
    adapter: &A,
    body: &str,
    options: &ModerationOptions,
) -> AiResult<ModerationResult> {
    let text = adapter.parse_chat_response(body)?;
    let scores: Value = serde_json::from_str(strip_code_fence(&text)).map_err(|e| {
        AiError::malformed(
            adapter.provider().name(),
            format!("moderation reply is not a JSON object: {}", e),
        )
    })?;
    moderation::parse_category_scores(&scores, options)
}

pub(crate) fn bearer(api_key: &str) -> (String, String) {
    ("Authorization".to_string(), format!("Bearer {}", api_key))
}
