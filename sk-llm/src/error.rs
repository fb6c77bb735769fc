use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompletionError>;

/// Failure taxonomy for a single completion call.
///
/// Each variant renders as `[<code>] <message>` so command handlers can show
/// the numeric code and wording to the user verbatim. Every error is terminal
/// for its call; the client never retries.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No key was configured. Reported before any network I/O happens.
    #[error("[401] missing OPENROUTER_API_KEY in the environment")]
    MissingApiKey,

    #[error("[401] API key rejected by OpenRouter")]
    KeyRejected,

    #[error("[429] rate limit exceeded, try again later")]
    RateLimited,

    /// Upstream 5xx, or any other non-success status outside the table.
    #[error("[500] upstream internal error (status {0})")]
    Upstream(u16),

    #[error("[503] connection error: {0}")]
    Connection(String),

    #[error("[408] request timeout after {0:?}")]
    Timeout(Duration),

    /// HTTP 200 whose body is missing `choices[0].message.content`.
    #[error("[500] unexpected response structure: {0}")]
    UnexpectedResponse(String),
}

impl CompletionError {
    /// HTTP-style code surfaced alongside the message.
    pub fn code(&self) -> u16 {
        match self {
            Self::MissingApiKey | Self::KeyRejected => 401,
            Self::RateLimited => 429,
            Self::Upstream(_) | Self::UnexpectedResponse(_) => 500,
            Self::Connection(_) => 503,
            Self::Timeout(_) => 408,
        }
    }
}
