//! Meta Llama API adapter.
//!
//! Requests follow the chat completions dialect; replies use Llama's own
//! `completion_message` envelope and `event`-typed stream chunks.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    chat::{ChatInput, ChatOptions},
    config::ServiceConfig,
    errors::{AiError, AiResult},
    providers::{
        ChatAdapter, ProviderKind, bearer, emit, extract_content, parse_response_json, stream_json,
        openai::provider::{
            Dialect, OPENAI_DIALECT, TokenField, build_openai_request, process_openai_stream_event, to_payload,
        },
        vendor_error_message,
    },
    stream::StreamEvent,
};

const META_DIALECT: Dialect = Dialect {
    provider: ProviderKind::Meta,
    token_field: TokenField::MaxCompletionTokens,
    strict_schema: false,
    stream_usage: false,
    ..OPENAI_DIALECT
};

#[derive(Deserialize, Debug)]
struct LlamaStreamChunk {
    event: LlamaStreamEvent,
}

#[derive(Deserialize, Debug)]
struct LlamaStreamEvent {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    delta: Option<LlamaDelta>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LlamaDelta {
    #[serde(default)]
    text: Option<String>,
}

fn is_length(reason: Option<&str>) -> bool {
    matches!(reason, Some("length") | Some("max_tokens"))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MetaAdapter;

impl ChatAdapter for MetaAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Meta
    }

    fn build_chat_payload(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<Value> {
        let request = build_openai_request(service, input, options, streaming, &META_DIALECT)?;
        to_payload(self.provider(), &request)
    }

    fn parse_chat_response(&self, body: &str) -> AiResult<String> {
        let json = parse_response_json(self.provider(), body)?;
        let stop_reason = json
            .pointer("/completion_message/stop_reason")
            .or_else(|| json.pointer("/choices/0/finish_reason"))
            .and_then(Value::as_str);
        if is_length(stop_reason) {
            return Err(AiError::token_limit(self.provider().name(), "completion stopped at the token limit"));
        }
        extract_content(self.provider(), &json, self.chat_response_content_paths())
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        &["completion_message.content.text", "choices[0].message.content"]
    }

    fn process_chat_stream_event(&self, event: &StreamEvent, on_token: &mut dyn FnMut(&str)) -> AiResult<bool> {
        let provider = self.provider();
        let Some(data) = event.data() else {
            return Ok(true);
        };
        // The compatibility endpoint streams chat completions chunks
        if data.trim() == "[DONE]" || data.contains("\"choices\"") {
            return process_openai_stream_event(provider, event, on_token);
        }

        let Some(json) = stream_json(provider, data) else {
            return Ok(true);
        };
        if let Some(message) = vendor_error_message(&json) {
            return Err(AiError::vendor(provider.name(), message));
        }

        let chunk: LlamaStreamChunk = match serde_json::from_value(json) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Skipping unrecognised stream chunk");
                return Ok(true);
            }
        };

        if let Some(text) = chunk.event.delta.as_ref().and_then(|delta| delta.text.as_deref()) {
            emit(on_token, text);
        }

        if chunk.event.event_type == "complete" {
            if is_length(chunk.event.stop_reason.as_deref()) {
                return Err(AiError::token_limit(provider.name(), "stream stopped at the token limit"));
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn chat_url(&self, service: &ServiceConfig, _streaming: bool) -> String {
        format!("{}chat/completions", service.base_url())
    }

    fn request_headers(&self, service: &ServiceConfig) -> Vec<(String, String)> {
        vec![bearer(&service.api_key)]
    }
}
