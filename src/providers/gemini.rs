//! Google Gemini adapter.

pub mod model;
pub mod provider;
pub mod utils;

pub use model::*;
pub use provider::GeminiAdapter;
