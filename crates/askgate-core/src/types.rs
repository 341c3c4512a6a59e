use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub type ChunkId = Uuid;
pub type DocumentId = Uuid;

/// Structured metadata attached to documents and chunks (department, date, tags, ...).
///
/// Ordered map so that serialization and iteration never depend on hash order.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A logical document version. Owns its chunks through the corpus arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub source_uri: String,
    #[serde(default = "Document::default_version")]
    pub version: u32,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    fn default_version() -> u32 {
        1
    }

    pub fn new(source_uri: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new_v4(),
            source_uri: source_uri.into(),
            version: 1,
            mime_type: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A bounded, structure-respecting segment of a document; the unit of retrieval.
///
/// Immutable once stored in the corpus. `document_metadata` is a copy of the
/// owning document's metadata taken at insert time so filters can be evaluated
/// on the chunk alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub document_version: u32,
    pub ordinal: u32,
    #[serde(default)]
    pub heading: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub document_metadata: Metadata,
}

impl Chunk {
    pub fn new(document: &Document, ordinal: u32, text: impl Into<String>) -> Self {
        Self {
            id: ChunkId::new_v4(),
            document_id: document.id,
            document_version: document.version,
            ordinal,
            heading: None,
            text: text.into(),
            metadata: Metadata::new(),
            document_metadata: document.metadata.clone(),
        }
    }

    pub fn with_id(mut self, id: ChunkId) -> Self {
        self.id = id;
        self
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Resolve a filterable field. Chunk metadata shadows document metadata.
    pub fn field(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "document_id" => Some(serde_json::Value::String(self.document_id.to_string())),
            "document_version" => Some(serde_json::Value::from(self.document_version)),
            "ordinal" => Some(serde_json::Value::from(self.ordinal)),
            _ => self
                .metadata
                .get(name)
                .or_else(|| self.document_metadata.get(name))
                .cloned(),
        }
    }
}

/// One backend hit: the chunk itself (held, not referenced by id) and its score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk: Arc<Chunk>, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// A fused candidate. Created per request and never persisted.
///
/// A score is `None` when the chunk was not returned by that path, which is
/// different from a zero score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalCandidate {
    #[serde(serialize_with = "serialize_chunk_id")]
    pub chunk: Arc<Chunk>,
    pub semantic_score: Option<f32>,
    pub lexical_score: Option<f32>,
    pub semantic_rank: Option<usize>,
    pub lexical_rank: Option<usize>,
    pub fused_score: f64,
    pub rank: usize,
}

fn serialize_chunk_id<S: serde::Serializer>(
    chunk: &Arc<Chunk>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&chunk.id.to_string())
}

impl RetrievalCandidate {
    pub fn id(&self) -> ChunkId {
        self.chunk.id
    }

    pub fn in_both_lists(&self) -> bool {
        self.semantic_score.is_some() && self.lexical_score.is_some()
    }
}

/// Caller-supplied policy knob controlling how conservative the Strategist is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Strict,
    Balanced,
    Permissive,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskProfile::Strict => write!(f, "strict"),
            RiskProfile::Balanced => write!(f, "balanced"),
            RiskProfile::Permissive => write!(f, "permissive"),
        }
    }
}

impl FromStr for RiskProfile {
    type Err = crate::AskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            "permissive" => Ok(Self::Permissive),
            other => Err(crate::AskError::invalid_request(format!(
                "unknown risk_profile '{}': expected strict, balanced or permissive",
                other
            ))),
        }
    }
}
