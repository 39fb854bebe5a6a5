//! The Responses API dialect of OpenAI.

use serde::Serialize;
use serde_json::Value;

use crate::{
    chat::{AttachmentContent, ChatInput, ChatOptions, GeneratedImage, ImageOptions, Role},
    config::ServiceConfig,
    errors::{AiError, AiResult},
    moderation::{ModerationOptions, ModerationResult},
    providers::{
        ChatAdapter, ProviderKind, bearer, emit, ensure_chat_capabilities, ensure_moderation_capability, extract_content,
        parse_response_json, stream_json, vendor_error_message,
    },
    stream::StreamEvent,
};

use super::provider::{
    Sampling, native_image_payload, native_image_url, native_moderation_payload, native_moderation_url,
    parse_native_image, parse_native_moderation, sampling_for,
};

#[derive(Serialize, Debug)]
pub struct ResponsesRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub input: Vec<ResponsesInputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextConfig>,
}

#[derive(Serialize, Debug)]
pub struct ResponsesInputItem {
    pub role: String,
    pub content: Vec<ResponsesContentPart>,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesContentPart {
    InputText {
        text: String,
    },
    OutputText {
        text: String,
    },
    InputImage {
        image_url: String,
    },
    InputFile {
        #[serde(skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_data: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
    },
}

#[derive(Serialize, Debug)]
pub struct ReasoningConfig {
    pub effort: String,
}

#[derive(Serialize, Debug)]
pub struct TextConfig {
    pub format: TextFormat,
}

#[derive(Serialize, Debug)]
pub struct TextFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub name: String,
    pub strict: bool,
    pub schema: Value,
}

/// Responses API adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiResponsesAdapter;

impl OpenAiResponsesAdapter {
    pub fn build_request(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<ResponsesRequest> {
        ensure_chat_capabilities(service, input, options, streaming)?;

        let mut items = Vec::with_capacity(input.history().len() + 1);
        for turn in input.history() {
            let mut content = vec![match turn.role {
                Role::Assistant => ResponsesContentPart::OutputText {
                    text: turn.content.clone(),
                },
                Role::System | Role::User => ResponsesContentPart::InputText {
                    text: turn.content.clone(),
                },
            }];
            if turn.role == Role::User {
                content.extend(turn.file_refs.iter().map(|file| ResponsesContentPart::InputFile {
                    filename: None,
                    file_data: None,
                    file_id: Some(file.id.clone()),
                }));
            }
            items.push(ResponsesInputItem {
                role: turn.role.as_str().to_string(),
                content,
            });
        }

        let mut content = vec![ResponsesContentPart::InputText {
            text: input.message().to_string(),
        }];
        for image in input.images() {
            let image_url = match image.content() {
                AttachmentContent::Reference(reference) => reference.clone(),
                AttachmentContent::Bytes(_) => image.data_uri().unwrap_or_default(),
            };
            content.push(ResponsesContentPart::InputImage { image_url });
        }
        for file in input.files() {
            content.push(match file.content() {
                AttachmentContent::Reference(reference) => ResponsesContentPart::InputFile {
                    filename: None,
                    file_data: None,
                    file_id: Some(reference.clone()),
                },
                AttachmentContent::Bytes(_) => ResponsesContentPart::InputFile {
                    filename: Some(file.file_name().to_string()),
                    file_data: file.data_uri(),
                    file_id: None,
                },
            });
        }
        items.push(ResponsesInputItem {
            role: "user".to_string(),
            content,
        });

        let (temperature, top_p, reasoning) = match sampling_for(&service.model_version()) {
            Sampling::Classic => (Some(options.temperature()), Some(options.top_p()), None),
            Sampling::Reasoning {
                effort,
                keep_temperature,
            } => (
                keep_temperature.then_some(options.temperature()),
                None,
                effort.map(|effort| ReasoningConfig {
                    effort: effort.to_string(),
                }),
            ),
        };

        Ok(ResponsesRequest {
            model: service.model.clone(),
            instructions: options.system_prompt().map(str::to_string),
            input: items,
            max_output_tokens: options.max_tokens(),
            temperature,
            top_p,
            reasoning,
            stream: streaming.then_some(true),
            text: options.json_schema().map(|schema| TextConfig {
                format: TextFormat {
                    format_type: "json_schema".to_string(),
                    name: "response".to_string(),
                    strict: true,
                    schema: schema.strict().into_value(),
                },
            }),
        })
    }
}

impl ChatAdapter for OpenAiResponsesAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAiResponses
    }

    fn build_chat_payload(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<Value> {
        let request = self.build_request(service, input, options, streaming)?;
        serde_json::to_value(request)
            .map_err(|e| AiError::invalid_input(format!("Failed to encode {} request: {}", self.provider(), e)))
    }

    fn parse_chat_response(&self, body: &str) -> AiResult<String> {
        let json = parse_response_json(self.provider(), body)?;

        if json.get("status").and_then(Value::as_str) == Some("incomplete") {
            let reason = json
                .pointer("/incomplete_details/reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            if reason == "max_output_tokens" {
                return Err(AiError::token_limit(self.provider().name(), "response is incomplete"));
            }
            tracing::warn!(provider = %self.provider(), reason, "Response is incomplete");
        }

        extract_content(self.provider(), &json, self.chat_response_content_paths())
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        &["output[*].content[*].text", "output_text"]
    }

    fn process_chat_stream_event(&self, event: &StreamEvent, on_token: &mut dyn FnMut(&str)) -> AiResult<bool> {
        let Some(data) = event.data() else {
            return Ok(true);
        };
        let provider = self.provider();
        let Some(json) = stream_json(provider, data) else {
            return Ok(true);
        };

        match json.get("type").and_then(Value::as_str).unwrap_or_default() {
            "response.output_text.delta" => {
                if let Some(delta) = json.get("delta").and_then(Value::as_str) {
                    emit(on_token, delta);
                }
                Ok(true)
            }
            "response.completed" => Ok(false),
            "response.incomplete" => {
                let reason = json
                    .pointer("/response/incomplete_details/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                if reason == "max_output_tokens" {
                    return Err(AiError::token_limit(provider.name(), "stream ended incomplete"));
                }
                tracing::warn!(provider = %provider, reason, "Stream ended incomplete");
                Ok(false)
            }
            "response.failed" => {
                let message = json
                    .get("response")
                    .and_then(vendor_error_message)
                    .unwrap_or_else(|| "response failed".to_string());
                Err(AiError::vendor(provider.name(), message))
            }
            "error" => {
                let message = json
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| vendor_error_message(&json))
                    .unwrap_or_else(|| data.to_string());
                Err(AiError::vendor(provider.name(), message))
            }
            _ => Ok(true),
        }
    }

    fn chat_url(&self, service: &ServiceConfig, _streaming: bool) -> String {
        format!("{}responses", service.base_url())
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
