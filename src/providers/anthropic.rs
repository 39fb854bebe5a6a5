//! Anthropic Messages API adapter.

pub mod model;
pub mod provider;

pub use model::*;
pub use provider::AnthropicAdapter;
