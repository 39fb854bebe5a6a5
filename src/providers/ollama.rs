//! Ollama `/api/chat` adapter.

pub mod model;
pub mod provider;

pub use model::*;
pub use provider::OllamaAdapter;
