//! OpenRouter speaks the chat completions dialect with a few differences:
//! token limits are always `max_tokens`, document references are URLs,
//! replies may carry only `reasoning` text, and upstream failures can arrive
//! as error objects in the middle of a stream.

use serde_json::Value;

use crate::{
    chat::{ChatInput, ChatOptions},
    config::ServiceConfig,
    errors::AiResult,
    providers::{
        ChatAdapter, ProviderKind, bearer,
        openai::provider::{
            Dialect, DocumentStyle, ImageStyle, OPENAI_DIALECT, TokenField, build_openai_request,
            parse_openai_response, process_openai_stream_event, to_payload,
        },
    },
    stream::StreamEvent,
};

const OPENROUTER_DIALECT: Dialect = Dialect {
    provider: ProviderKind::OpenRouter,
    token_field: TokenField::MaxTokens,
    images: ImageStyle::Object,
    documents: DocumentStyle::Url,
    ..OPENAI_DIALECT
};

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenRouterAdapter;

impl ChatAdapter for OpenRouterAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    fn build_chat_payload(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<Value> {
        let request = build_openai_request(service, input, options, streaming, &OPENROUTER_DIALECT)?;
        to_payload(self.provider(), &request)
    }

    fn parse_chat_response(&self, body: &str) -> AiResult<String> {
        parse_openai_response(self.provider(), body, self.chat_response_content_paths())
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        // Reasoning models can reply with reasoning only
        &["choices[0].message.content", "choices[0].message.reasoning", "choices[0].text"]
    }

    fn process_chat_stream_event(&self, event: &StreamEvent, on_token: &mut dyn FnMut(&str)) -> AiResult<bool> {
        process_openai_stream_event(self.provider(), event, on_token)
    }

    fn chat_url(&self, service: &ServiceConfig, _streaming: bool) -> String {
        format!("{}chat/completions", service.base_url())
    }

    fn request_headers(&self, service: &ServiceConfig) -> Vec<(String, String)> {
        vec![
            bearer(&service.api_key),
            ("X-Title".to_string(), env!("CARGO_PKG_NAME").to_string()),
        ]
    }
}
