//! A vendor-neutral façade over chat, structured output, streaming,
//! moderation and image generation for several AI services.

pub mod chat;
pub mod client;
pub mod config;
pub mod errors;
pub mod json_path;
pub mod moderation;
pub mod providers;
pub mod schema;
pub mod stream;
pub mod telemetry;
pub mod transport;
pub mod version;

// Re-export commonly used types for easier access
pub use chat::{
    Attachment, AttachmentContent, ChatInput, ChatOptions, FileReference, GeneratedImage, HistoryTurn,
    ImageOptions, Role,
};
pub use client::AiClient;
pub use config::{AiConfig, Capabilities, ServiceConfig, load_config, load_config_from};
pub use errors::{AiError, AiResult};
pub use moderation::{ModerationOptions, ModerationResult};
pub use providers::{ChatAdapter, ProviderKind, adapter_for};
pub use schema::{Described, JsonSchema};
pub use telemetry::init_tracing;
pub use transport::{FileUploader, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use version::AIModelVersion;
