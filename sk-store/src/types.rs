use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub owner: i64,
    pub text: String,
}

/// Seeded persona. Read-only reference data; never mutated by end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub name: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    /// Upstream model identifier, forwarded verbatim to the completion API.
    pub key: String,
    pub label: String,
    pub active: bool,
}
