use thiserror::Error;

#[derive(Error, Debug)]
pub enum KarteError {
    #[error("Expected a {expected} resource, got '{found}'")]
    SchemaMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KarteError>;
