//! Telegram transport for Sidekick.
//!
//! Pure I/O: long-polls `getUpdates`, reduces each update to an
//! `InboundCommand`, and sends plain-text replies (optionally with a reply
//! keyboard) back via `sendMessage`. No command semantics live here.

mod telegram;
mod types;

pub use telegram::TelegramBot;
pub use types::{InboundCommand, Keyboard, Reply};
