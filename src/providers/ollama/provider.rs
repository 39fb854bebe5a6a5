use serde_json::Value;

use crate::{
    chat::{AttachmentContent, ChatInput, ChatOptions},
    config::ServiceConfig,
    errors::{AiError, AiResult},
    providers::{
        ChatAdapter, ProviderKind, bearer, emit, ensure_chat_capabilities, extract_content, parse_response_json,
        stream_json, vendor_error_message,
    },
    stream::StreamEvent,
};

use super::model::*;

/// Local models served by Ollama
#[derive(Debug, Default, Clone, Copy)]
pub struct OllamaAdapter;

impl OllamaAdapter {
    pub fn build_request(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<OllamaRequest> {
        ensure_chat_capabilities(service, input, options, streaming)?;

        let mut messages = Vec::with_capacity(input.history().len() + 2);
        if let Some(system) = options.system_prompt() {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
                images: Vec::new(),
            });
        }
        messages.extend(input.history().iter().map(|turn| OllamaMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
            images: Vec::new(),
        }));

        let images = input
            .images()
            .iter()
            .map(|image| match image.content() {
                AttachmentContent::Bytes(_) => Ok(image.base64().unwrap_or_default()),
                AttachmentContent::Reference(_) => Err(AiError::unsupported(
                    self.provider().name(),
                    "image references",
                    format!("'{}' must be sent as bytes", image.file_name()),
                )),
            })
            .collect::<AiResult<Vec<_>>>()?;
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: input.message().to_string(),
            images,
        });

        Ok(OllamaRequest {
            model: service.model.clone(),
            messages,
            stream: streaming,
            format: options.json_schema().map(|schema| schema.as_value().clone()),
            options: OllamaOptions {
                temperature: options.temperature(),
                top_p: options.top_p(),
                num_predict: options.max_tokens(),
            },
        })
    }

    fn check_done(&self, chunk: &OllamaChunk) -> AiResult<bool> {
        if chunk.done && chunk.done_reason.as_deref() == Some("length") {
            return Err(AiError::token_limit(self.provider().name(), "done_reason 'length'"));
        }
        Ok(chunk.done)
    }
}

impl ChatAdapter for OllamaAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
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
        if let Ok(chunk) = serde_json::from_value::<OllamaChunk>(json.clone()) {
            self.check_done(&chunk)?;
        }
        extract_content(self.provider(), &json, self.chat_response_content_paths())
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        &["message.content"]
    }

    fn process_chat_stream_event(&self, event: &StreamEvent, on_token: &mut dyn FnMut(&str)) -> AiResult<bool> {
        let Some(data) = event.data() else {
            return Ok(true);
        };
        let provider = self.provider();
        let Some(json) = stream_json(provider, data) else {
            return Ok(true);
        };
        if let Some(message) = vendor_error_message(&json) {
            return Err(AiError::vendor(provider.name(), message));
        }

        let chunk: OllamaChunk = match serde_json::from_value(json) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Skipping unrecognised stream line");
                return Ok(true);
            }
        };

        if let Some(message) = &chunk.message {
            emit(on_token, &message.content);
        }
        Ok(!self.check_done(&chunk)?)
    }

    fn chat_url(&self, service: &ServiceConfig, _streaming: bool) -> String {
        format!("{}api/chat", service.base_url())
    }

    fn request_headers(&self, service: &ServiceConfig) -> Vec<(String, String)> {
        // Local servers need no key; hosted ones take a bearer token
        if service.api_key.trim().is_empty() {
            Vec::new()
        } else {
            vec![bearer(&service.api_key)]
        }
    }
}
