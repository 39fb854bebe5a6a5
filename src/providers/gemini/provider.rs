use serde_json::Value;

use crate::{
    chat::{ChatInput, ChatOptions, GeneratedImage, ImageOptions},
    config::ServiceConfig,
    errors::{AiError, AiResult},
    providers::{
        ChatAdapter, ProviderKind, emit, ensure_chat_capabilities, parse_response_json,
        stream_json, vendor_error_message,
    },
    stream::StreamEvent,
};

use super::{model::*, utils};

/// Google Gemini adapter
#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiAdapter;

impl GeminiAdapter {
    /// 将统一的聊天输入转换为Gemini generateContent请求
    ///
    /// ## 内部实现逻辑
    /// 1. 系统提示放入`systemInstruction`
    /// 2. 历史轮次转换为`contents`，assistant角色映射为`model`
    /// 3. 附件转换为`inlineData`（字节）或`fileData`（引用）
    /// 4. 结构化输出通过`responseMimeType`和`responseJsonSchema`传递
    pub fn build_request(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<GeminiRequest> {
        ensure_chat_capabilities(service, input, options, streaming)?;

        let (system_instruction, contents) = utils::build_contents(input, options);
        let schema = options.json_schema();

        Ok(GeminiRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: options.max_tokens(),
                temperature: Some(options.temperature()),
                top_p: Some(options.top_p()),
                response_mime_type: schema.map(|_| "application/json".to_string()),
                response_json_schema: schema.map(|schema| schema.as_value().clone()),
                response_modalities: None,
            },
        })
    }

    fn encode(&self, request: &GeminiRequest) -> AiResult<Value> {
        serde_json::to_value(request)
            .map_err(|e| AiError::invalid_input(format!("Failed to encode {} request: {}", self.provider(), e)))
    }

    fn decode(&self, json: Value) -> AiResult<GeminiResponse> {
        serde_json::from_value(json)
            .map_err(|e| AiError::malformed(self.provider().name(), format!("unexpected response shape: {}", e)))
    }
}

impl ChatAdapter for GeminiAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn build_chat_payload(
        &self,
        service: &ServiceConfig,
        input: &ChatInput,
        options: &ChatOptions,
        streaming: bool,
    ) -> AiResult<Value> {
        let request = self.build_request(service, input, options, streaming)?;
        self.encode(&request)
    }

    fn parse_chat_response(&self, body: &str) -> AiResult<String> {
        let json = parse_response_json(self.provider(), body)?;
        let response = self.decode(json)?;
        utils::check_finish(&response)?;

        // Same part filter as streaming: thought summaries are not the answer
        let text: String = utils::answer_texts(&response).collect();
        if text.trim().is_empty() {
            return Err(AiError::MissingContent {
                provider: self.provider().name().to_string(),
                paths: self
                    .chat_response_content_paths()
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            });
        }
        Ok(text)
    }

    fn chat_response_content_paths(&self) -> &'static [&'static str] {
        &["candidates[0].content.parts[*].text"]
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

        let chunk = match self.decode(json) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Skipping unrecognised stream chunk");
                return Ok(true);
            }
        };

        for text in utils::answer_texts(&chunk) {
            emit(on_token, text);
        }

        // A finish reason on a chunk marks the end of the stream
        Ok(!utils::check_finish(&chunk)?)
    }

    fn chat_url(&self, service: &ServiceConfig, streaming: bool) -> String {
        if streaming {
            format!("{}models/{}:streamGenerateContent?alt=sse", service.base_url(), service.model)
        } else {
            format!("{}models/{}:generateContent", service.base_url(), service.model)
        }
    }

    fn request_headers(&self, service: &ServiceConfig) -> Vec<(String, String)> {
        vec![("x-goog-api-key".to_string(), service.api_key.clone())]
    }

    fn uploads_files(&self) -> bool {
        true
    }

    fn build_image_payload(&self, service: &ServiceConfig, prompt: &str, _options: &ImageOptions) -> AiResult<Value> {
        if !service.capabilities().image_generation {
            return Err(AiError::unsupported(
                self.provider().name(),
                "image generation",
                format!("model '{}' cannot generate images", service.model),
            ));
        }

        let request = GeminiRequest {
            system_instruction: None,
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::text(prompt)],
            }],
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                ..GenerationConfig::default()
            },
        };
        self.encode(&request)
    }

    fn parse_image_response(&self, body: &str, _options: &ImageOptions) -> AiResult<GeneratedImage> {
        let json = parse_response_json(self.provider(), body)?;
        let response = self.decode(json)?;
        utils::check_finish(&response)?;

        let blob = response
            .candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .find_map(|part| part.inline_data.as_ref())
            .ok_or_else(|| AiError::MissingContent {
                provider: self.provider().name().to_string(),
                paths: vec!["candidates[0].content.parts[*].inlineData".to_string()],
            })?;

        GeneratedImage::from_base64(blob.mime_type.clone(), &blob.data)
            .map_err(|e| AiError::malformed(self.provider().name(), format!("image is not valid base64: {}", e)))
    }
}
