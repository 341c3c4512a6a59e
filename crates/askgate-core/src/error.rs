use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single `ask` request.
///
/// Every variant maps to a stable [`ErrorKind`] so callers can branch on the
/// kind without parsing messages. An empty fused context is deliberately not
/// represented here: it is a normal terminal outcome of the request.
#[derive(Error, Debug, Clone)]
pub enum AskError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Embedding failure: {0}")]
    EmbeddingFailure(String),

    #[error("Retrieval timed out on both backends (semantic {semantic:?}, lexical {lexical:?})")]
    RetrievalTimeout {
        semantic: Duration,
        lexical: Duration,
    },

    #[error("Retrieval failed on both backends: semantic: {semantic}; lexical: {lexical}")]
    RetrievalFailed { semantic: String, lexical: String },

    #[error("Provider error after {attempts} attempt(s): {message}")]
    ProviderError { attempts: u32, message: String },

    #[error("Provider fatal error: {0}")]
    ProviderFatal(String),

    #[error("Validation inconclusive during {stage}: {message}")]
    ValidationInconclusive { stage: String, message: String },

    #[error("Request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("Corpus unavailable: {0}")]
    CorpusUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AskError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingFailure(msg.into())
    }

    pub fn inconclusive(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ValidationInconclusive {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AskError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AskError::EmbeddingFailure(_) => ErrorKind::EmbeddingFailure,
            AskError::RetrievalTimeout { .. } => ErrorKind::RetrievalTimeout,
            AskError::RetrievalFailed { .. } => ErrorKind::RetrievalFailed,
            AskError::ProviderError { .. } => ErrorKind::ProviderError,
            AskError::ProviderFatal(_) => ErrorKind::ProviderFatal,
            AskError::ValidationInconclusive { .. } => ErrorKind::ValidationInconclusive,
            AskError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            AskError::CorpusUnavailable(_) => ErrorKind::CorpusUnavailable,
            AskError::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the caller, not the system, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AskError::InvalidRequest(_))
    }
}

/// Stable, serializable error identifier exposed on the request surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    EmbeddingFailure,
    RetrievalTimeout,
    RetrievalFailed,
    ProviderError,
    ProviderFatal,
    ValidationInconclusive,
    DeadlineExceeded,
    CorpusUnavailable,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::EmbeddingFailure => "embedding_failure",
            ErrorKind::RetrievalTimeout => "retrieval_timeout",
            ErrorKind::RetrievalFailed => "retrieval_failed",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::ProviderFatal => "provider_fatal",
            ErrorKind::ValidationInconclusive => "validation_inconclusive",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::CorpusUnavailable => "corpus_unavailable",
            ErrorKind::Config => "config",
        };
        write!(f, "{}", s)
    }
}

/// Errors raised while building or loading the corpus arena.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dimension mismatch for chunk {chunk}: expected {expected}, got {actual}")]
    DimensionMismatch {
        chunk: crate::ChunkId,
        expected: usize,
        actual: usize,
    },

    #[error("Embedding for chunk {0} contains NaN or infinite values")]
    NonFiniteEmbedding(crate::ChunkId),

    #[error("Chunk {chunk} claims document {claimed} but is being stored under {owner}")]
    ForeignChunk {
        chunk: crate::ChunkId,
        claimed: crate::DocumentId,
        owner: crate::DocumentId,
    },

    #[error("Chunk {0} is already owned by another document")]
    DuplicateChunk(crate::ChunkId),

    #[error("Invalid corpus record on line {line}: {message}")]
    InvalidRecord { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, AskError>;
