use ai_facade::AiError;
use ai_facade::providers::vendor_error_message;
use serde_json::json;

#[test]
fn test_status_classification() {
    let cases = [
        (400, "BadRequest"),
        (401, "Unauthorized"),
        (403, "Forbidden"),
        (404, "NotFound"),
        (429, "RateLimited"),
        (502, "Unavailable"),
        (503, "Unavailable"),
        (504, "Unavailable"),
        (500, "Http"),
        (418, "Http"),
    ];

    for (status, expected) in cases {
        let err = AiError::from_status(status, "boom");
        let actual = match err {
            AiError::BadRequest(_) => "BadRequest",
            AiError::Unauthorized(_) => "Unauthorized",
            AiError::Forbidden(_) => "Forbidden",
            AiError::NotFound(_) => "NotFound",
            AiError::RateLimited(_) => "RateLimited",
            AiError::Unavailable(_) => "Unavailable",
            AiError::Http { .. } => "Http",
            _ => "other",
        };
        assert_eq!(actual, expected, "status {}", status);
    }
}

#[test]
fn test_status_message_prefers_vendor_envelope() {
    let err = AiError::from_status(401, r#"{"error":{"message":"Invalid API key","type":"auth"}}"#);
    assert!(matches!(err, AiError::Unauthorized(ref m) if m == "Invalid API key"));

    let err = AiError::from_status(500, "  upstream exploded \n");
    match err {
        AiError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_vendor_error_envelopes() {
    assert_eq!(
        vendor_error_message(&json!({"error": {"message": "bad"}})),
        Some("bad".to_string())
    );
    assert_eq!(vendor_error_message(&json!({"error": "plain"})), Some("plain".to_string()));
    assert_eq!(
        vendor_error_message(&json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})),
        Some("Overloaded".to_string())
    );
    assert_eq!(
        vendor_error_message(&json!({"object": "error", "message": "Invalid model"})),
        Some("Invalid model".to_string())
    );
    assert_eq!(vendor_error_message(&json!({"detail": "Not authenticated"})), Some("Not authenticated".to_string()));
    assert_eq!(
        vendor_error_message(&json!({"error": {"code": 400, "status": "INVALID_ARGUMENT"}})),
        Some("INVALID_ARGUMENT".to_string())
    );
}

#[test]
fn test_non_error_documents() {
    assert_eq!(vendor_error_message(&json!({"choices": []})), None);
    assert_eq!(vendor_error_message(&json!({"error": null, "id": "x"})), None);
    assert_eq!(vendor_error_message(&json!([1, 2])), None);
}

#[test]
fn test_predicates() {
    assert!(AiError::token_limit("OpenAI", "finish_reason=length").is_token_limit());
    assert!(!AiError::vendor("OpenAI", "x").is_token_limit());
    assert!(AiError::RateLimited("x".to_string()).is_retryable());
    assert!(AiError::Transport("reset".to_string()).is_retryable());
    assert!(!AiError::Unauthorized("x".to_string()).is_retryable());
}

#[test]
fn test_display_names_provider() {
    let err = AiError::unsupported("Ollama", "image generation", "no endpoint");
    assert_eq!(err.to_string(), "Ollama does not support image generation: no endpoint");

    let err = AiError::malformed("Anthropic", "body is not valid JSON");
    assert!(err.to_string().contains("Anthropic"));
}

#[test]
fn test_anyhow_errors_become_config_errors() {
    let err: AiError = anyhow::anyhow!("missing field").context("loading").into();
    match err {
        AiError::Config(message) => {
            assert!(message.contains("loading"));
            assert!(message.contains("missing field"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
