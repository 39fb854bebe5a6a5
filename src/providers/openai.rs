//! OpenAI chat completions and Responses API adapters.
//!
//! The request builder and stream handling in [`provider`] are shared with
//! the OpenAI-compatible vendors.

pub mod model;
pub mod provider;
pub mod responses;

pub use model::*;
pub use provider::OpenAiAdapter;
pub use responses::OpenAiResponsesAdapter;
