use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad user input: empty text, note limit reached. Reported to the user
    /// with a corrective message, never fatal.
    #[error("validation: {0}")]
    Validation(String),

    /// Activation or assignment naming a nonexistent model/character id.
    /// Callers must catch this and emit a corrective message.
    #[error("unknown {entity} id {id}")]
    UnknownReference { entity: &'static str, id: i64 },

    /// Store corruption (e.g. no active model at read time). Fatal for the
    /// read; never auto-healed.
    #[error("store inconsistent: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
