use thiserror::Error;

pub type Result<T> = std::result::Result<T, MenuError>;

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Record validation failed: {0}")]
    Validation(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Collection schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl MenuError {
    /// Stable outcome code for the error kind, so automated callers can
    /// branch on kind instead of parsing messages.
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            Self::IndexUnavailable(_) => "INDEX_UNAVAILABLE",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}

pub mod catalog;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod normalizer;
pub mod pipeline;
pub mod search;
pub mod sync;
