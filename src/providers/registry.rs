use super::{
    ChatAdapter, ProviderKind,
    anthropic::AnthropicAdapter,
    gemini::GeminiAdapter,
    meta::MetaAdapter,
    mistral::MistralAdapter,
    ollama::OllamaAdapter,
    openai::{OpenAiAdapter, OpenAiResponsesAdapter},
    openrouter::OpenRouterAdapter,
};

static OPENAI: OpenAiAdapter = OpenAiAdapter;
static OPENAI_RESPONSES: OpenAiResponsesAdapter = OpenAiResponsesAdapter;
static ANTHROPIC: AnthropicAdapter = AnthropicAdapter;
static GEMINI: GeminiAdapter = GeminiAdapter;
static OLLAMA: OllamaAdapter = OllamaAdapter;
static OPENROUTER: OpenRouterAdapter = OpenRouterAdapter;
static META: MetaAdapter = MetaAdapter;
static MISTRAL: MistralAdapter = MistralAdapter;

/// 根据提供商类型获取对应的适配器
///
/// ## 功能说明
/// 适配器是无状态的策略对象，每个提供商类型对应一个全局实例
///
/// ## 执行例子
/// ```rust
/// use ai_facade::providers::{ProviderKind, adapter_for};
///
/// let adapter = adapter_for(ProviderKind::Anthropic);
/// assert_eq!(adapter.provider(), ProviderKind::Anthropic);
/// ```
pub fn adapter_for(kind: ProviderKind) -> &'static dyn ChatAdapter {
    match kind {
        ProviderKind::OpenAi => &OPENAI,
        ProviderKind::OpenAiResponses => &OPENAI_RESPONSES,
        ProviderKind::Anthropic => &ANTHROPIC,
        ProviderKind::Google => &GEMINI,
        ProviderKind::Ollama => &OLLAMA,
        ProviderKind::OpenRouter => &OPENROUTER,
        ProviderKind::Meta => &META,
        ProviderKind::Mistral => &MISTRAL,
    }
}
