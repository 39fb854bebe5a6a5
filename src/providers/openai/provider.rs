use std::sync::LazyLock;

use serde_json::Value;

use crate::{
    chat::{Attachment, AttachmentContent, ChatInput, ChatOptions, GeneratedImage, ImageOptions, Role},
    config::ServiceConfig,
    errors::{AiError, AiResult},
    moderation::{self, ModerationOptions, ModerationResult},
    providers::{
        ChatAdapter, ProviderKind, bearer, emit, ensure_chat_capabilities, ensure_moderation_capability, extract_content,
        parse_response_json, stream_json,
    },
    stream::StreamEvent,
    version::AIModelVersion,
};

use super::model::*;

/// First model generation that takes `max_completion_tokens` and a reasoning effort
static GPT_5: LazyLock<AIModelVersion> = LazyLock::new(|| AIModelVersion::new("gpt", 5, 0));

const MODERATION_MODEL: &str = "omni-moderation-latest";

/// How a model wants its sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sampling {
    Classic,
    Reasoning {
        effort: Option<&'static str>,
        keep_temperature: bool,
    },
}

pub(crate) fn sampling_for(version: &AIModelVersion) -> Sampling {
    if *GPT_5 <= *version {
        // gpt-5 documents temperature as unsupported at minimal effort but honours it
        Sampling::Reasoning {
            effort: Some("minimal"),
            keep_temperature: true,
        }
    } else if version.family() == "o" {
        Sampling::Reasoning {
            effort: None,
            keep_temperature: false,
        }
    } else {
        Sampling::Classic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenField {
    MaxTokens,
    MaxCompletionTokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageStyle {
    Object,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentStyle {
    /// Inline data URI, references are file ids
    FileId,
    /// Inline data URI, references are URLs
    Url,
    /// Only `document_url` references
    ReferenceOnly,
}

/// Differences between the OpenAI-compatible chat dialects
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dialect {
    pub provider: ProviderKind,
    pub token_field: TokenField,
    pub strict_schema: bool,
    pub images: ImageStyle,
    pub documents: DocumentStyle,
    pub stream_usage: bool,
}

pub(crate) const OPENAI_DIALECT: Dialect = Dialect {
    provider: ProviderKind::OpenAi,
    token_field: TokenField::MaxTokens,
    strict_schema: true,
    images: ImageStyle::Object,
    documents: DocumentStyle::FileId,
    stream_usage: true,
};

/// Build a chat completions request in the given dialect
pub(crate) fn build_openai_request(
    service: &ServiceConfig,
    input: &ChatInput,
    options: &ChatOptions,
    streaming: bool,
    dialect: &Dialect,
) -> AiResult<OpenAIRequest> {
    ensure_chat_capabilities(service, input, options, streaming)?;

    let max_tokens = options.max_tokens();
    let (max_tokens, max_completion_tokens) = match dialect.token_field {
        TokenField::MaxTokens => (max_tokens, None),
        TokenField::MaxCompletionTokens => (None, max_tokens),
    };

    let response_format = options.json_schema().map(|schema| ResponseFormat {
        format_type: "json_schema".to_string(),
        json_schema: JsonSchemaFormat {
            name: "response".to_string(),
            strict: dialect.strict_schema.then_some(true),
            schema: if dialect.strict_schema {
                schema.strict().into_value()
            } else {
                schema.as_value().clone()
            },
        },
    });

    Ok(OpenAIRequest {
        model: service.model.clone(),
        messages: build_messages(input, options, dialect)?,
        max_tokens,
        max_completion_tokens,
        temperature: Some(options.temperature()),
        top_p: Some(options.top_p()),
        reasoning_effort: None,
        stream: streaming.then_some(true),
        stream_options: (streaming && dialect.stream_usage).then_some(StreamOptions { include_usage: true }),
        response_format,
    })
}

fn build_messages(input: &ChatInput, options: &ChatOptions, dialect: &Dialect) -> AiResult<Vec<OpenAIMessage>> {
    let mut messages = Vec::with_capacity(input.history().len() + 2);

    if let Some(system) = options.system_prompt() {
        messages.push(OpenAIMessage::text("system", system));
    }

    for turn in input.history() {
        if turn.file_refs.is_empty() || turn.role != Role::User {
            messages.push(OpenAIMessage::text(turn.role.as_str(), turn.content.clone()));
            continue;
        }

        let mut parts = vec![OpenAIContentPart::Text {
            text: turn.content.clone(),
        }];
        for file in &turn.file_refs {
            let media_type = file.media_type.as_deref().unwrap_or("application/octet-stream");
            let attachment = Attachment::from_reference(file.id.clone(), media_type, file.id.clone());
            parts.push(document_part(&attachment, dialect)?);
        }
        messages.push(OpenAIMessage {
            role: turn.role.as_str().to_string(),
            content: OpenAIContent::Parts(parts),
        });
    }

    if !input.has_attachments() {
        messages.push(OpenAIMessage::text("user", input.message()));
        return Ok(messages);
    }

    let mut parts = vec![OpenAIContentPart::Text {
        text: input.message().to_string(),
    }];
    for image in input.images() {
        parts.push(image_part(image, dialect));
    }
    for file in input.files() {
        parts.push(document_part(file, dialect)?);
    }
    messages.push(OpenAIMessage {
        role: "user".to_string(),
        content: OpenAIContent::Parts(parts),
    });

    Ok(messages)
}

fn image_part(image: &Attachment, dialect: &Dialect) -> OpenAIContentPart {
    let url = match image.content() {
        AttachmentContent::Reference(reference) => reference.clone(),
        AttachmentContent::Bytes(_) => image.data_uri().unwrap_or_default(),
    };
    let image_url = match dialect.images {
        ImageStyle::Object => ImageUrl::Object { url },
        ImageStyle::Plain => ImageUrl::Plain(url),
    };
    OpenAIContentPart::ImageUrl { image_url }
}

fn document_part(file: &Attachment, dialect: &Dialect) -> AiResult<OpenAIContentPart> {
    match (file.content(), dialect.documents) {
        (AttachmentContent::Bytes(_), DocumentStyle::ReferenceOnly) => Err(AiError::unsupported(
            dialect.provider.name(),
            "file upload",
            format!("'{}' must be uploaded before it can be referenced", file.file_name()),
        )),
        (AttachmentContent::Bytes(_), _) => Ok(OpenAIContentPart::File {
            file: FilePart {
                filename: Some(file.file_name().to_string()),
                file_data: file.data_uri(),
                file_id: None,
            },
        }),
        (AttachmentContent::Reference(reference), DocumentStyle::FileId) => Ok(OpenAIContentPart::File {
            file: FilePart {
                file_id: Some(reference.clone()),
                ..FilePart::default()
            },
        }),
        (AttachmentContent::Reference(reference), DocumentStyle::Url) => Ok(OpenAIContentPart::File {
            file: FilePart {
                filename: Some(file.file_name().to_string()),
                file_data: Some(reference.clone()),
                file_id: None,
            },
        }),
        (AttachmentContent::Reference(reference), DocumentStyle::ReferenceOnly) => {
            Ok(OpenAIContentPart::DocumentUrl {
                document_url: reference.clone(),
            })
        }
    }
}

pub(crate) fn to_payload(provider: ProviderKind, request: &OpenAIRequest) -> AiResult<Value> {
    serde_json::to_value(request)
        .map_err(|e| AiError::invalid_input(format!("Failed to encode {} request: {}", provider, e)))
}

/// Non-streaming response of any chat-completions dialect
pub(crate) fn parse_openai_response(provider: ProviderKind, body: &str, paths: &[&str]) -> AiResult<String> {
    let json = parse_response_json(provider, body)?;

    if let Some(reason) = json.pointer("/choices/0/finish_reason").and_then(Value::as_str) {
        if is_length_reason(reason) {
            return Err(AiError::token_limit(
                provider.name(),
                format!("finish_reason '{}'", reason),
            ));
        }
    }

    if let Some(refusal) = json.pointer("/choices/0/message/refusal").and_then(Value::as_str) {
        if !refusal.trim().is_empty() {
            return Err(AiError::vendor(provider.name(), format!("model refused: {}", refusal)));
        }
    }

    extract_content(provider, &json, paths)
}

fn is_length_reason(reason: &str) -> bool {
    matches!(reason, "length" | "model_length" | "max_tokens")
}

/// One streamed chunk of any chat-completions dialect
pub(crate) fn process_openai_stream_event(
    provider: ProviderKind,
    event: &StreamEvent,
    on_token: &mut dyn FnMut(&str),
) -> AiResult<bool> {
    let Some(data) = event.data() else {
        return Ok(true);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(false);
    }
    // Role-only and usage chunks carry nothing to forward
    if !(data.contains("\"content\"") || data.contains("finish_reason") || data.contains("\"error\"")) {
        return Ok(true);
    }

    let Some(json) = stream_json(provider, data) else {
        return Ok(true);
    };
    if let Some(message) = crate::providers::vendor_error_message(&json) {
        return Err(AiError::vendor(provider.name(), message));
    }

    let chunk: OpenAIStreamResponse = match serde_json::from_value(json) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "Skipping unrecognised stream chunk");
            return Ok(true);
        }
    };

    for choice in chunk.choices {
        match choice.delta.content {
            Some(DeltaContent::Text(text)) => emit(on_token, &text),
            Some(DeltaContent::Chunks(chunks)) => {
                for text in chunks.iter().filter_map(|c| c.text.as_deref()) {
                    emit(on_token, text);
                }
            }
            None => {}
        }
        if let Some(reason) = choice.finish_reason.as_deref() {
            if is_length_reason(reason) {
                return Err(AiError::token_limit(
                    provider.name(),
                    format!("stream finished with '{}'", reason),
                ));
            }
        }
    }

    Ok(true)
}

/// Chat completions adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    /// The request before it is encoded, with model-specific parameters applied
    pub fn build_request(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<OpenAIRequest> {
        let mut request = build_openai_request(service, input, options, streaming, &OPENAI_DIALECT)?;

        if let Sampling::Reasoning {
            effort,
            keep_temperature,
        } = sampling_for(&service.model_version())
        {
            request.max_completion_tokens = request.max_tokens.take();
            request.reasoning_effort = effort.map(str::to_string);
            request.top_p = None;
            if !keep_temperature {
                request.temperature = None;
            }
        }

        Ok(request)
    }
}

impl ChatAdapter for OpenAiAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn build_chat_payload(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<Value> {
        let request = self.build_request(service, input, options, streaming)?;
        to_payload(self.provider(), &request)
    }

    fn parse_chat_response(&self, body: &str) -> AiResult<String> {
        parse_openai_response(self.provider(), body, self.chat_response_content_paths())
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        &["choices[0].message.content"]
    }

    fn process_chat_stream_event(&self, event: &StreamEvent, on_token: &mut dyn FnMut(&str)) -> AiResult<bool> {
        process_openai_stream_event(self.provider(), event, on_token)
    }

    fn chat_url(&self, service: &ServiceConfig, _streaming: bool) -> String {
        format!("{}chat/completions", service.base_url())
    }

    fn request_headers(&self, service: &ServiceConfig) -> Vec<(String, String)> {
        vec![bearer(&service.api_key)]
    }

    fn uploads_files(&self) -> bool {
        true
    }

    fn moderation_url(&self, service: &ServiceConfig) -> String {
        native_moderation_url(service)
    }

    fn build_moderation_payload(
        &self,
        service: &ServiceConfig,
        content: &str,
        _options: &ModerationOptions,
    ) -> AiResult<Value> {
        ensure_moderation_capability(service)?;
        native_moderation_payload(content)
    }

    fn parse_moderation_response(&self, body: &str, options: &ModerationOptions) -> AiResult<ModerationResult> {
        parse_native_moderation(self.provider(), body, options)
    }

    fn image_url(&self, service: &ServiceConfig) -> String {
        native_image_url(service)
    }

    fn build_image_payload(&self, service: &ServiceConfig, prompt: &str, options: &ImageOptions) -> AiResult<Value> {
        native_image_payload(self.provider(), service, prompt, options)
    }

    fn parse_image_response(&self, body: &str, options: &ImageOptions) -> AiResult<GeneratedImage> {
        parse_native_image(self.provider(), body, options)
    }
}

pub(crate) fn native_moderation_url(service: &ServiceConfig) -> String {
    format!("{}moderations", service.base_url())
}

pub(crate) fn native_moderation_payload(content: &str) -> AiResult<Value> {
    let request = ModerationRequest {
        model: MODERATION_MODEL.to_string(),
        input: content.to_string(),
    };
    serde_json::to_value(request)
        .map_err(|e| AiError::invalid_input(format!("Failed to encode moderation request: {}", e)))
}

/// Read `results[0].category_scores` of the moderation endpoint
pub(crate) fn parse_native_moderation(
    provider: ProviderKind,
    body: &str,
    options: &ModerationOptions,
) -> AiResult<ModerationResult> {
    let json = parse_response_json(provider, body)?;
    let scores = json
        .pointer("/results/0/category_scores")
        .ok_or_else(|| AiError::MissingContent {
            provider: provider.name().to_string(),
            paths: vec!["results[0].category_scores".to_string()],
        })?;
    moderation::parse_category_scores(scores, options)
}

pub(crate) fn native_image_url(service: &ServiceConfig) -> String {
    format!("{}images/generations", service.base_url())
}

pub(crate) fn native_image_payload(
    provider: ProviderKind,
    service: &ServiceConfig,
    prompt: &str,
    options: &ImageOptions,
) -> AiResult<Value> {
    if !service.capabilities().image_generation {
        return Err(AiError::unsupported(
            provider.name(),
            "image generation",
            format!("model '{}' cannot generate images", service.model),
        ));
    }

    // dall-e returns URLs unless asked for base64; gpt-image always returns base64
    let legacy = service.model.starts_with("dall-e");
    let request = ImageGenerationRequest {
        model: service.model.clone(),
        prompt: prompt.to_string(),
        n: 1,
        size: options.size().to_string(),
        quality: options.quality().map(str::to_string),
        output_format: (!legacy).then(|| options.output_format().to_string()),
        response_format: legacy.then(|| "b64_json".to_string()),
    };
    serde_json::to_value(request)
        .map_err(|e| AiError::invalid_input(format!("Failed to encode image request: {}", e)))
}

pub(crate) fn parse_native_image(provider: ProviderKind, body: &str, options: &ImageOptions) -> AiResult<GeneratedImage> {
    let json = parse_response_json(provider, body)?;
    let response: ImageGenerationResponse = serde_json::from_value(json)
        .map_err(|e| AiError::malformed(provider.name(), format!("unexpected image response: {}", e)))?;

    let data = response
        .data
        .into_iter()
        .find_map(|image| image.b64_json)
        .ok_or_else(|| AiError::MissingContent {
            provider: provider.name().to_string(),
            paths: vec!["data[0].b64_json".to_string()],
        })?;

    GeneratedImage::from_base64(format!("image/{}", options.output_format()), &data)
        .map_err(|e| AiError::malformed(provider.name(), format!("image is not valid base64: {}", e)))
}
