use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

use ai_facade::config::LoggingConfig;
use ai_facade::schema::{Described, FieldDescriptor, RecordDescriptor, TypeDescriptor};
use ai_facade::{
    AiClient, AiConfig, AiError, AiResult, Attachment, Capabilities, ChatInput, ChatOptions, FileReference,
    FileUploader, ImageOptions, ModerationOptions, ProviderKind, ReqwestTransport, ServiceConfig,
};

#[derive(Deserialize, Debug, PartialEq)]
struct Weather {
    city: String,
    temperature: i64,
}

impl Described for Weather {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Record(RecordDescriptor::new("Weather", || {
            vec![
                FieldDescriptor::of::<String>("city"),
                FieldDescriptor::of::<i64>("temperature"),
            ]
        }))
    }
}

/// Client for `provider` pointed at the mock server
fn create_test_client(server: &MockServer, provider: ProviderKind, model: &str) -> AiClient {
    let service = ServiceConfig::new(provider, model, "test-api-key").with_endpoint(server.uri());
    AiClient::new(service, Arc::new(ReqwestTransport::new().unwrap()))
}

fn chat_completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

fn sse_body(chunks: &[&str]) -> String {
    chunks.iter().map(|chunk| format!("data: {}\n\n", chunk)).collect()
}

/// Uploader that hands out sequential ids and remembers what it saw
#[derive(Default)]
struct RecordingUploader {
    uploaded: Mutex<Vec<String>>,
}

#[async_trait]
impl FileUploader for RecordingUploader {
    async fn upload(&self, _service: &ServiceConfig, attachment: &Attachment) -> AiResult<FileReference> {
        let mut uploaded = self.uploaded.lock().unwrap();
        uploaded.push(attachment.file_name().to_string());
        Ok(FileReference::new(
            format!("file_{}", uploaded.len()),
            Some(attachment.media_type().to_string()),
        ))
    }
}

#[tokio::test]
async fn test_chat_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Hello there")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let reply = client
        .chat(&ChatInput::text("hi").unwrap(), &ChatOptions::default())
        .await
        .unwrap();
    assert_eq!(reply, "Hello there");
}

#[tokio::test]
async fn test_chat_error_statuses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Invalid API key", "type": "invalid_request_error", "code": "invalid_api_key"}
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let result = client
        .chat(&ChatInput::text("hi").unwrap(), &ChatOptions::default())
        .await;
    match result {
        Err(AiError::Unauthorized(message)) => assert_eq!(message, "Invalid API key"),
        other => panic!("Expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_is_retryable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::Mistral, "mistral-small-latest");
    let err = client
        .chat(&ChatInput::text("hi").unwrap(), &ChatOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::RateLimited(ref m) if m == "slow down"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_capability_failure_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("unused")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = ServiceConfig::new(ProviderKind::OpenAi, "gpt-4o", "test-api-key")
        .with_endpoint(mock_server.uri())
        .with_capabilities(Capabilities::NONE);
    let client = AiClient::new(service, Arc::new(ReqwestTransport::new().unwrap()));

    let result = client
        .chat_stream(&ChatInput::text("hi").unwrap(), &ChatOptions::default(), |_| {})
        .await;
    assert!(matches!(result, Err(AiError::CapabilityUnsupported { .. })));

    let result = client.generate_image("a fox", &ImageOptions::default()).await;
    assert!(matches!(result, Err(AiError::CapabilityUnsupported { .. })));
}

#[tokio::test]
async fn test_capability_failure_uploads_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("unused"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = ServiceConfig::new(ProviderKind::Anthropic, "claude-sonnet-4-5", "test-api-key")
        .with_endpoint(mock_server.uri())
        .with_capabilities(Capabilities {
            streaming: false,
            ..ProviderKind::Anthropic.default_capabilities()
        });
    let uploader = Arc::new(RecordingUploader::default());
    let client = AiClient::new(service, Arc::new(ReqwestTransport::new().unwrap())).with_uploader(uploader.clone());
    let input = ChatInput::builder()
        .message("summarize")
        .file(b"%PDF-1.7".to_vec(), "application/pdf")
        .build()
        .unwrap();

    let result = client.chat_stream(&input, &ChatOptions::default(), |_| {}).await;
    assert!(matches!(result, Err(AiError::CapabilityUnsupported { ref capability, .. }) if capability == "streaming"));
    assert!(uploader.uploaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_moderation_requires_capability() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("unused"))
        .expect(0)
        .mount(&mock_server)
        .await;

    for provider in [ProviderKind::OpenAi, ProviderKind::Anthropic] {
        let service = ServiceConfig::new(provider, "some-model", "test-api-key")
            .with_endpoint(mock_server.uri())
            .with_capabilities(Capabilities {
                moderation: false,
                ..provider.default_capabilities()
            });
        let client = AiClient::new(service, Arc::new(ReqwestTransport::new().unwrap()));
        let result = client.moderate("some text", &ModerationOptions::default()).await;
        assert!(
            matches!(result, Err(AiError::CapabilityUnsupported { ref capability, .. }) if capability == "moderation"),
            "{:?}",
            result
        );
    }
}

#[tokio::test]
async fn test_chat_structured() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_schema", "json_schema": {"strict": true}}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion(r#"{"city":"Oslo","temperature":-3}"#)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let weather: Weather = client
        .chat_structured(&ChatInput::text("weather in Oslo").unwrap(), &ChatOptions::default())
        .await
        .unwrap();
    assert_eq!(
        weather,
        Weather {
            city: "Oslo".to_string(),
            temperature: -3
        }
    );
}

#[tokio::test]
async fn test_chat_structured_reports_bad_fields() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("```json\n{\"city\":\"Oslo\",\"temperature\":\"cold\"}\n```")),
        )
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let result = client
        .chat_structured::<Weather>(&ChatInput::text("weather").unwrap(), &ChatOptions::default())
        .await;
    match result {
        Err(AiError::Schema(err)) => assert!(err.to_string().contains("temperature")),
        other => panic!("Expected a schema error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_stream() {
    let mock_server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
        r#"{"choices":[{"delta":{"content":", world"}}]}"#,
        r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let mut tokens = Vec::new();
    client
        .chat_stream(&ChatInput::text("hi").unwrap(), &ChatOptions::default(), |t| {
            tokens.push(t.to_string())
        })
        .await
        .unwrap();
    assert_eq!(tokens, vec!["Hello", ", world"]);
}

#[tokio::test]
async fn test_stream_without_end_marker_still_succeeds() {
    let mock_server = MockServer::start().await;
    let body = sse_body(&[r#"{"choices":[{"delta":{"content":"cut"}}]}"#]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenRouter, "openai/gpt-4o");
    let mut text = String::new();
    client
        .chat_stream(&ChatInput::text("hi").unwrap(), &ChatOptions::default(), |t| text.push_str(t))
        .await
        .unwrap();
    assert_eq!(text, "cut");
}

#[tokio::test]
async fn test_stream_error_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::Anthropic, "claude-sonnet-4-5");
    let result = client
        .chat_stream(&ChatInput::text("hi").unwrap(), &ChatOptions::default(), |_| {})
        .await;
    assert!(matches!(result, Err(AiError::Unavailable(_))));
}

#[tokio::test]
async fn test_ndjson_stream() {
    let mock_server = MockServer::start().await;
    let body = [
        r#"{"message":{"role":"assistant","content":"local "},"done":false}"#,
        r#"{"message":{"role":"assistant","content":"model"},"done":false}"#,
        r#"{"message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
    ]
    .join("\n");
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&mock_server)
        .await;

    let service = ServiceConfig::new(ProviderKind::Ollama, "llama3.2", "").with_endpoint(mock_server.uri());
    let client = AiClient::new(service, Arc::new(ReqwestTransport::new().unwrap()));
    let mut text = String::new();
    client
        .chat_stream(&ChatInput::text("hi").unwrap(), &ChatOptions::default(), |t| text.push_str(t))
        .await
        .unwrap();
    assert_eq!(text, "local model");
}

#[tokio::test]
async fn test_native_moderation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/moderations"))
        .and(body_partial_json(json!({"model": "omni-moderation-latest", "input": "I will hurt you"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "modr-1",
            "results": [{
                "flagged": true,
                "category_scores": {"violence": 0.91, "harassment/threatening": 0.62, "hate": 0.01}
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let result = client
        .moderate("I will hurt you", &ModerationOptions::default())
        .await
        .unwrap();
    assert!(result.is_flagged());
    assert_eq!(result.highest_category(), Some(("violence", 0.91)));
    assert_eq!(result.categories_above_threshold(), vec!["harassment/threatening", "violence"]);
}

#[tokio::test]
async fn test_moderation_rejects_blank_content() {
    let mock_server = MockServer::start().await;
    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let result = client.moderate("   ", &ModerationOptions::default()).await;
    assert!(matches!(result, Err(AiError::InvalidInput(_))));
}

#[tokio::test]
async fn test_image_generation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(body_partial_json(json!({"model": "gpt-image-1", "size": "1024x1024"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 1,
            "data": [{"b64_json": "iVBORw0KGgo="}]
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-image-1");
    let image = client
        .generate_image("a lighthouse at dusk", &ImageOptions::default())
        .await
        .unwrap();
    assert_eq!(image.media_type, "image/png");
    assert_eq!(&image.bytes[..4], &[0x89, b'P', b'N', b'G']);

    let blank = client.generate_image(" ", &ImageOptions::default()).await;
    assert!(matches!(blank, Err(AiError::InvalidInput(_))));
}

#[tokio::test]
async fn test_files_are_uploaded_before_chat() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Summary"}],
            "stop_reason": "end_turn"
        })))
        .mount(&mock_server)
        .await;

    let uploader = Arc::new(RecordingUploader::default());
    let client = create_test_client(&mock_server, ProviderKind::Anthropic, "claude-sonnet-4-5")
        .with_uploader(uploader.clone());
    let input = ChatInput::builder()
        .message("summarize")
        .file(b"%PDF-1.7".to_vec(), "application/pdf")
        .attachment(Attachment::from_reference("file_existing", "application/pdf", "old.pdf"))
        .build()
        .unwrap();

    let reply = client.chat(&input, &ChatOptions::default()).await.unwrap();
    assert_eq!(reply, "Summary");
    assert_eq!(*uploader.uploaded.lock().unwrap(), vec!["file1.pdf".to_string()]);

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let content = &body["messages"][0]["content"];
    assert_eq!(content[0]["source"], json!({"type": "file", "file_id": "file_1"}));
    assert_eq!(content[1]["source"], json!({"type": "file", "file_id": "file_existing"}));
}

#[tokio::test]
async fn test_no_upload_for_inline_vendors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("ok")))
        .mount(&mock_server)
        .await;

    let uploader = Arc::new(RecordingUploader::default());
    let client = create_test_client(&mock_server, ProviderKind::OpenRouter, "openai/gpt-4o")
        .with_uploader(uploader.clone());
    let input = ChatInput::builder()
        .message("read")
        .file(b"pdf".to_vec(), "application/pdf")
        .build()
        .unwrap();

    client.chat(&input, &ChatOptions::default()).await.unwrap();
    assert!(uploader.uploaded.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_inside_multi_thread_runtime() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("blocking reply")))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let reply = client
        .chat_blocking(&ChatInput::text("hi").unwrap(), &ChatOptions::default())
        .unwrap();
    assert_eq!(reply, "blocking reply");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_without_runtime() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("from a plain thread")))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let handle = std::thread::spawn(move || {
        client.chat_blocking(&ChatInput::text("hi").unwrap(), &ChatOptions::default())
    });
    let reply = tokio::task::spawn_blocking(move || handle.join().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, "from a plain thread");
}

#[tokio::test]
async fn test_blocking_on_current_thread_runtime_is_rejected() {
    let mock_server = MockServer::start().await;
    let client = create_test_client(&mock_server, ProviderKind::OpenAi, "gpt-4o");
    let result = client.chat_blocking(&ChatInput::text("hi").unwrap(), &ChatOptions::default());
    assert!(matches!(result, Err(AiError::Config(_))));
}

#[test]
fn test_from_config() {
    let mut services = HashMap::new();
    services.insert(
        "writer".to_string(),
        ServiceConfig::new(ProviderKind::Google, "gemini-2.5-flash", "key"),
    );
    let config = AiConfig {
        services,
        logging: LoggingConfig::default(),
    };

    let client = AiClient::from_config(&config, "writer").unwrap();
    assert_eq!(client.service().model, "gemini-2.5-flash");
    assert_eq!(client.adapter().provider(), ProviderKind::Google);
    assert!(matches!(AiClient::from_config(&config, "reader"), Err(AiError::Config(_))));
}
