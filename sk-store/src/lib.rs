//! SQLite persistence for Sidekick.
//!
//! Owns the four tables (`notes`, `characters`, `models`, `user_character`)
//! and the constrained writes on them: the 50-note cap, the single active
//! model, and the one-character-per-user assignment. Callers receive plain
//! owned values; no connection handles leak out.

mod error;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use store::{MAX_NOTES_PER_OWNER, Store};
pub use types::{Character, Model, Note};
