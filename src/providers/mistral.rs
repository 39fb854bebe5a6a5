//! Mistral chat adapter.
//!
//! Images are plain URL strings and documents are only accepted as
//! `document_url` references, so byte documents need an uploader.

use serde_json::Value;

use crate::{
    chat::{ChatInput, ChatOptions},
    config::ServiceConfig,
    errors::AiResult,
    providers::{
        ChatAdapter, ProviderKind, bearer,
        openai::provider::{
            Dialect, DocumentStyle, ImageStyle, OPENAI_DIALECT, build_openai_request, parse_openai_response,
            process_openai_stream_event, to_payload,
        },
    },
    stream::StreamEvent,
};

const MISTRAL_DIALECT: Dialect = Dialect {
    provider: ProviderKind::Mistral,
    images: ImageStyle::Plain,
    documents: DocumentStyle::ReferenceOnly,
    stream_usage: false,
    ..OPENAI_DIALECT
};

#[derive(Debug, Default, Clone, Copy)]
pub struct MistralAdapter;

impl ChatAdapter for MistralAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Mistral
    }

    fn build_chat_payload(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<Value> {
        let request = build_openai_request(service, input, options, streaming, &MISTRAL_DIALECT)?;
        to_payload(self.provider(), &request)
    }

    fn parse_chat_response(&self, body: &str) -> AiResult<String> {
        parse_openai_response(self.provider(), body, self.chat_response_content_paths())
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        &["choices[0].message.content", "choices[0].message.content[*].text"]
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
}
