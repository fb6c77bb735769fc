//! OpenRouter chat-completion client for Sidekick.
//!
//! Pure HTTP client: one POST per call, fixed timeout, no retries, no
//! streaming. Every failure maps to a `CompletionError` carrying an
//! HTTP-style numeric code and a message fit for relaying to a chat user.

mod error;
mod openrouter;
mod types;

pub use error::{CompletionError, Result};
pub use openrouter::{API_KEY_ENV, DEFAULT_TIMEOUT, OpenRouterClient};
pub use types::{ChatMessage, Role};
