use serde::{Deserialize, Serialize};
use serde_json::Value;

// OpenAI-specific data structures for API communication
#[derive(Serialize, Debug, Clone, Default)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Debug, Clone)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: OpenAIContent,
}

impl OpenAIMessage {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: OpenAIContent::Text(text.into()),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FilePart },
    DocumentUrl { document_url: String },
}

/// Object form `{"url": ..}` for OpenAI, bare string for Mistral
#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum ImageUrl {
    Object { url: String },
    Plain(String),
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct FilePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Serialize, Debug, Clone)]
pub struct JsonSchemaFormat {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    pub schema: Value,
}

// Streaming structures
#[derive(Deserialize, Debug)]
pub struct OpenAIStreamResponse {
    #[serde(default)]
    pub choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize, Debug)]
pub struct OpenAIStreamChoice {
    #[serde(default)]
    pub delta: OpenAIStreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct OpenAIStreamDelta {
    #[serde(default)]
    pub content: Option<DeltaContent>,
}

/// Plain text, or the chunk array some compatible vendors send
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum DeltaContent {
    Text(String),
    Chunks(Vec<ContentChunk>),
}

#[derive(Deserialize, Debug)]
pub struct ContentChunk {
    #[serde(default)]
    pub text: Option<String>,
}

// Moderation endpoint
#[derive(Serialize, Debug)]
pub struct ModerationRequest {
    pub model: String,
    pub input: String,
}

// Image generation endpoint
#[derive(Serialize, Debug)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub data: Vec<GeneratedImageData>,
}

#[derive(Deserialize, Debug)]
pub struct GeneratedImageData {
    #[serde(default)]
    pub b64_json: Option<String>,
}
