use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AiError, AiResult};
use crate::schema::JsonSchema;

/// Author of a conversation turn
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A file that already lives on the vendor side
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub id: String,
    pub media_type: Option<String>,
}

impl FileReference {
    pub fn new(id: impl Into<String>, media_type: Option<String>) -> Self {
        Self {
            id: id.into(),
            media_type,
        }
    }
}

/// A prior turn of the conversation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub file_refs: Vec<FileReference>,
}

impl HistoryTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            file_refs: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            file_refs: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: FileReference) -> Self {
        self.file_refs.push(file);
        self
    }
}

/// Payload of an attachment: raw bytes, or a reference the vendor can resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentContent {
    Bytes(Vec<u8>),
    Reference(String),
}

/// An image or document attached to a chat message
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    content: AttachmentContent,
    media_type: String,
    file_name: String,
    metadata: BTreeMap<String, String>,
}

impl Attachment {
    pub fn from_bytes(bytes: Vec<u8>, media_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            content: AttachmentContent::Bytes(bytes),
            media_type: media_type.into(),
            file_name: file_name.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn from_reference(
        reference: impl Into<String>,
        media_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            content: AttachmentContent::Reference(reference.into()),
            media_type: media_type.into(),
            file_name: file_name.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn content(&self) -> &AttachmentContent {
        &self.content
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    pub fn reference(&self) -> Option<&str> {
        match &self.content {
            AttachmentContent::Reference(reference) => Some(reference),
            AttachmentContent::Bytes(_) => None,
        }
    }

    /// Copy with one more metadata entry; blank keys or values are ignored
    pub fn with_metadata(&self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let mut copy = self.clone();
        let (key, value) = (key.as_ref().trim(), value.as_ref().trim());
        if !key.is_empty() && !value.is_empty() {
            copy.metadata.insert(key.to_string(), value.to_string());
        }
        copy
    }

    /// Copy whose content has been replaced by a vendor-side reference
    pub fn with_reference(&self, reference: impl Into<String>) -> Self {
        Self {
            content: AttachmentContent::Reference(reference.into()),
            ..self.clone()
        }
    }

    /// Base64 of the raw bytes, `None` for referenced content
    pub fn base64(&self) -> Option<String> {
        match &self.content {
            AttachmentContent::Bytes(bytes) => Some(STANDARD.encode(bytes)),
            AttachmentContent::Reference(_) => None,
        }
    }

    pub fn data_uri(&self) -> Option<String> {
        self.base64()
            .map(|data| format!("data:{};base64,{}", self.media_type, data))
    }
}

fn extension_for(media_type: &str) -> &str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        "text/plain" => "txt",
        "text/markdown" => "md",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        other => other
            .rsplit('/')
            .next()
            .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin"),
    }
}

/// The normalized input of one chat call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatInput {
    message: String,
    images: Vec<Attachment>,
    files: Vec<Attachment>,
    history: Vec<HistoryTurn>,
}

impl ChatInput {
    pub fn builder() -> ChatInputBuilder {
        ChatInputBuilder::default()
    }

    /// Shorthand for a plain text message
    pub fn text(message: impl Into<String>) -> AiResult<Self> {
        Self::builder().message(message).build()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn images(&self) -> &[Attachment] {
        &self.images
    }

    pub fn files(&self) -> &[Attachment] {
        &self.files
    }

    pub fn history(&self) -> &[HistoryTurn] {
        &self.history
    }

    pub fn has_attachments(&self) -> bool {
        !self.images.is_empty() || !self.files.is_empty()
    }

    /// Same input with its file attachments replaced, order preserved
    pub fn with_files(&self, files: Vec<Attachment>) -> Self {
        Self {
            files,
            ..self.clone()
        }
    }
}

#[derive(Debug, Default)]
pub struct ChatInputBuilder {
    message: Option<String>,
    images: Vec<Attachment>,
    files: Vec<Attachment>,
    history: Vec<HistoryTurn>,
}

impl ChatInputBuilder {
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Add an image; its file name is generated from its position (`image1.png`, ...)
    pub fn image(mut self, bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        let media_type = media_type.into();
        let name = format!("image{}.{}", self.images.len() + 1, extension_for(&media_type));
        self.images.push(Attachment::from_bytes(bytes, media_type, name));
        self
    }

    /// Add a document; its file name is generated from its position (`file1.pdf`, ...)
    pub fn file(mut self, bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        let media_type = media_type.into();
        let name = format!("file{}.{}", self.files.len() + 1, extension_for(&media_type));
        self.files.push(Attachment::from_bytes(bytes, media_type, name));
        self
    }

    /// Add a prepared attachment, routed by its media type
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        if attachment.is_image() {
            self.images.push(attachment);
        } else {
            self.files.push(attachment);
        }
        self
    }

    pub fn history(mut self, turn: HistoryTurn) -> Self {
        self.history.push(turn);
        self
    }

    pub fn build(self) -> AiResult<ChatInput> {
        let message = self.message.unwrap_or_default();
        if message.trim().is_empty() {
            return Err(AiError::invalid_input("Chat message cannot be blank"));
        }

        Ok(ChatInput {
            message,
            images: self.images,
            files: self.files,
            history: self.history,
        })
    }
}

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 1.0;

/// Sampling and output options of one chat call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    top_p: f32,
    json_schema: Option<JsonSchema>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            top_p: DEFAULT_TOP_P,
            json_schema: None,
        }
    }
}

impl ChatOptions {
    pub fn builder() -> ChatOptionsBuilder {
        ChatOptionsBuilder {
            options: ChatOptions::default(),
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn json_schema(&self) -> Option<&JsonSchema> {
        self.json_schema.as_ref()
    }

    /// Builder seeded with these options
    pub fn to_builder(&self) -> ChatOptionsBuilder {
        ChatOptionsBuilder {
            options: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ChatOptionsBuilder {
    options: ChatOptions,
}

impl ChatOptionsBuilder {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.options.system_prompt = if prompt.trim().is_empty() { None } else { Some(prompt) };
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.options.top_p = top_p;
        self
    }

    pub fn json_schema(mut self, schema: JsonSchema) -> Self {
        self.options.json_schema = Some(schema);
        self
    }

    /// Validate and freeze the options
    pub fn build(self) -> AiResult<ChatOptions> {
        let options = self.options;
        if !(0.0..=2.0).contains(&options.temperature) {
            return Err(AiError::invalid_input(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                options.temperature
            )));
        }
        if !(0.0..=1.0).contains(&options.top_p) {
            return Err(AiError::invalid_input(format!(
                "Top-p must be between 0.0 and 1.0, got {}",
                options.top_p
            )));
        }
        if options.max_tokens == Some(0) {
            return Err(AiError::invalid_input("Max tokens must be positive"));
        }
        if let Some(schema) = &options.json_schema {
            if !schema.is_object_schema() {
                return Err(AiError::invalid_input(
                    "Structured output schema must describe a JSON object",
                ));
            }
        }
        Ok(options)
    }
}

/// Options for image generation
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    size: String,
    quality: Option<String>,
    output_format: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            size: "1024x1024".to_string(),
            quality: None,
            output_format: "png".to_string(),
        }
    }
}

impl ImageOptions {
    pub fn builder() -> ImageOptionsBuilder {
        ImageOptionsBuilder {
            options: ImageOptions::default(),
        }
    }

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }

    pub fn output_format(&self) -> &str {
        &self.output_format
    }

    /// `(width, height)` parsed from the size
    pub fn dimensions(&self) -> (u32, u32) {
        parse_size(&self.size).unwrap_or((1024, 1024))
    }
}

fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[derive(Debug)]
pub struct ImageOptionsBuilder {
    options: ImageOptions,
}

impl ImageOptionsBuilder {
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.options.size = size.into();
        self
    }

    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.options.quality = Some(quality.into());
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.options.output_format = format.into();
        self
    }

    pub fn build(self) -> AiResult<ImageOptions> {
        let options = self.options;
        match parse_size(&options.size) {
            Some((w, h)) if w > 0 && h > 0 => {}
            _ => {
                return Err(AiError::invalid_input(format!(
                    "Image size must look like WIDTHxHEIGHT, got '{}'",
                    options.size
                )));
            }
        }
        if !["png", "jpeg", "webp"].contains(&options.output_format.as_str()) {
            return Err(AiError::invalid_input(format!(
                "Unsupported image output format '{}'",
                options.output_format
            )));
        }
        Ok(options)
    }
}

/// An image returned by a generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl GeneratedImage {
    /// Decode a base64 payload as returned by the vendors
    pub fn from_base64(media_type: impl Into<String>, data: &str) -> Result<Self, base64::DecodeError> {
        let bytes = STANDARD.decode(data.trim())?;
        Ok(Self {
            media_type: media_type.into(),
            bytes,
        })
    }
}

/// Helper for providers that accept a raw JSON value as schema
pub(crate) fn schema_value(options: &ChatOptions) -> Option<&Value> {
    options.json_schema().map(JsonSchema::as_value)
}
