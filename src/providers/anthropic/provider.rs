// Anthropic Messages API adapter
use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value;

use crate::{
    chat::{Attachment, AttachmentContent, ChatInput, ChatOptions, DEFAULT_TOP_P, Role},
    config::ServiceConfig,
    errors::{AiError, AiResult},
    providers::{
        ChatAdapter, ProviderKind, emit, ensure_chat_capabilities, extract_content, parse_response_json,
        stream_json,
    },
    stream::StreamEvent,
    version::AIModelVersion,
};

use super::model::*;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_BETA: &str = "files-api-2025-04-14,structured-outputs-2025-11-13";
/// `max_tokens` is mandatory on this API
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// From this generation on, temperature and top_p are mutually exclusive
static CLAUDE_4_5: LazyLock<AIModelVersion> = LazyLock::new(|| AIModelVersion::new("claude", 4, 5));

#[derive(Debug, Default, Clone, Copy)]
pub struct AnthropicAdapter;

impl AnthropicAdapter {
    /// 将统一的聊天输入转换为Anthropic Messages API请求
    ///
    /// ## 内部实现逻辑
    /// 1. 校验服务能力（流式、结构化输出、文件）
    /// 2. 系统提示和历史中的system轮次合并为`system`字段
    /// 3. 图片和文档转换为base64或file引用内容块
    /// 4. 旧于claude 4.5的模型且top_p非默认值时才发送top_p
    /// 5. 结构化输出通过`output_format`传递严格化后的schema
    pub fn build_request(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<AnthropicRequest> {
        ensure_chat_capabilities(service, input, options, streaming)?;

        let mut system_parts: Vec<&str> = options.system_prompt().into_iter().collect();
        let mut messages = Vec::with_capacity(input.history().len() + 1);

        for turn in input.history() {
            match turn.role {
                Role::System => system_parts.push(&turn.content),
                Role::Assistant => messages.push(AnthropicMessage::text("assistant", turn.content.clone())),
                Role::User => {
                    let mut content = vec![ContentBlock::Text {
                        text: turn.content.clone(),
                    }];
                    for file in &turn.file_refs {
                        let media_type = file.media_type.as_deref().unwrap_or("application/pdf");
                        let source = Source::File {
                            file_id: file.id.clone(),
                        };
                        content.push(if media_type.starts_with("image/") {
                            ContentBlock::Image { source }
                        } else {
                            ContentBlock::Document { source, title: None }
                        });
                    }
                    messages.push(AnthropicMessage {
                        role: "user".to_string(),
                        content,
                    });
                }
            }
        }

        let mut content = Vec::with_capacity(1 + input.images().len() + input.files().len());
        for image in input.images() {
            content.push(ContentBlock::Image {
                source: source_for(image, true),
            });
        }
        for file in input.files() {
            content.push(ContentBlock::Document {
                source: source_for(file, false),
                title: Some(file.file_name().to_string()),
            });
        }
        content.push(ContentBlock::Text {
            text: input.message().to_string(),
        });
        messages.push(AnthropicMessage {
            role: "user".to_string(),
            content,
        });

        let top_p = (options.top_p() != DEFAULT_TOP_P && service.model_version() < *CLAUDE_4_5)
            .then_some(options.top_p());

        Ok(AnthropicRequest {
            model: service.model.clone(),
            max_tokens: options.max_tokens().unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            messages,
            // The API caps temperature at 1.0
            temperature: Some(options.temperature().min(1.0)),
            top_p,
            stream: streaming.then_some(true),
            output_format: options.json_schema().map(|schema| OutputFormat {
                format_type: "json_schema".to_string(),
                schema: schema.strict().into_value(),
            }),
        })
    }
}

fn source_for(attachment: &Attachment, image: bool) -> Source {
    match attachment.content() {
        AttachmentContent::Bytes(bytes) => Source::Base64 {
            media_type: attachment.media_type().to_string(),
            data: STANDARD.encode(bytes),
        },
        AttachmentContent::Reference(reference) if image && reference.starts_with("http") => Source::Url {
            url: reference.clone(),
        },
        AttachmentContent::Reference(reference) => Source::File {
            file_id: reference.clone(),
        },
    }
}

impl ChatAdapter for AnthropicAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
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
        if json.get("stop_reason").and_then(Value::as_str) == Some("max_tokens") {
            return Err(AiError::token_limit(self.provider().name(), "stop_reason 'max_tokens'"));
        }
        extract_content(self.provider(), &json, self.chat_response_content_paths())
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        &["content[*].text"]
    }

    fn process_chat_stream_event(&self, event: &StreamEvent, on_token: &mut dyn FnMut(&str)) -> AiResult<bool> {
        let Some(data) = event.data() else {
            return Ok(true);
        };
        let provider = self.provider();
        let Some(json) = stream_json(provider, data) else {
            return Ok(true);
        };

        let event: AnthropicStreamEvent = match serde_json::from_value(json) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Skipping unrecognised stream event");
                return Ok(true);
            }
        };

        match event {
            AnthropicStreamEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } => {
                emit(on_token, &text);
                Ok(true)
            }
            AnthropicStreamEvent::MessageDelta { delta } if delta.stop_reason.as_deref() == Some("max_tokens") => {
                Err(AiError::token_limit(provider.name(), "stream stopped at max_tokens"))
            }
            AnthropicStreamEvent::MessageStop => Ok(false),
            AnthropicStreamEvent::Error { error } => Err(AiError::vendor(
                provider.name(),
                format!("{}: {}", error.error_type, error.message),
            )),
            _ => Ok(true),
        }
    }

    fn chat_url(&self, service: &ServiceConfig, _streaming: bool) -> String {
        format!("{}messages", service.base_url())
    }

    fn request_headers(&self, service: &ServiceConfig) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), service.api_key.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
            ("anthropic-beta".to_string(), ANTHROPIC_BETA.to_string()),
        ]
    }

    fn uploads_files(&self) -> bool {
        true
    }
}
