use thiserror::Error;

/// A backend could not answer. Never folded into an empty result list.
#[derive(Error, Debug, Clone)]
pub enum RetrievalError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    #[error("Search error: {0}")]
    Search(String),
}

impl RetrievalError {
    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
