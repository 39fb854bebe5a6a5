use ai_facade::{ProviderKind, adapter_for};

#[test]
fn test_every_provider_has_an_adapter() {
    for kind in ProviderKind::ALL {
        let adapter = adapter_for(kind);
        assert_eq!(adapter.provider(), kind);
        assert!(!adapter.chat_response_content_paths().is_empty());
    }
}

#[test]
fn test_provider_names_and_serde() {
    assert_eq!(ProviderKind::OpenAiResponses.to_string(), "OpenAI Responses");
    let kind: ProviderKind = serde_json::from_str("\"openai-responses\"").unwrap();
    assert_eq!(kind, ProviderKind::OpenAiResponses);
    assert_eq!(serde_json::to_string(&ProviderKind::Google).unwrap(), "\"google\"");
}

#[test]
fn test_default_capabilities() {
    assert!(ProviderKind::OpenAi.default_capabilities().image_generation);
    assert!(ProviderKind::Google.default_capabilities().image_generation);
    assert!(!ProviderKind::Anthropic.default_capabilities().image_generation);
    assert!(ProviderKind::Anthropic.default_capabilities().file_upload);
    assert!(!ProviderKind::Ollama.default_capabilities().file_upload);
    assert!(ProviderKind::Meta.default_capabilities().structured_output);
    for kind in ProviderKind::ALL {
        assert!(kind.default_capabilities().moderation, "{} should moderate", kind);
    }
}

#[test]
fn test_adapter_uses_provider_endpoint() {
    assert_eq!(
        adapter_for(ProviderKind::OpenRouter).chat_url(
            &ai_facade::ServiceConfig::new(ProviderKind::OpenRouter, "openai/gpt-4o", "sk-or"),
            false
        ),
        "https://openrouter.ai/api/v1/chat/completions"
    );
}
