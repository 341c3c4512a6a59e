//! Arena-style corpus storage.
//!
//! A [`Document`] owns the identifiers of its chunks and every chunk owns at
//! most one embedding. Replacing or removing a document drops all of its
//! chunks and vectors in the same mutation; there is no cascading by
//! reference. Queries read an immutable [`Corpus`] snapshot published through
//! [`CorpusHandle`], so a search never observes a half-applied update.

use crate::error::CorpusError;
use crate::{Chunk, ChunkId, Document, DocumentId, Metadata};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct DocumentEntry {
    document: Document,
    chunk_ids: Vec<ChunkId>,
}

#[derive(Debug, Clone)]
struct ChunkSlot {
    chunk: Arc<Chunk>,
    embedding: Option<Arc<[f32]>>,
}

/// A chunk plus the optional embedding it will own once stored.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub chunk: Chunk,
    pub embedding: Option<Vec<f32>>,
}

impl ChunkInput {
    pub fn new(chunk: Chunk) -> Self {
        Self {
            chunk,
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    dimension: Option<usize>,
    documents: HashMap<DocumentId, DocumentEntry>,
    chunks: HashMap<ChunkId, ChunkSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub chunks: usize,
    pub embedded_chunks: usize,
    pub dimension: Option<usize>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the embedding dimensionality up front instead of inferring it from
    /// the first stored vector.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Insert a document, replacing any previous version and everything it owned.
    ///
    /// All inputs are validated before anything is mutated, so a rejected
    /// upsert leaves the corpus exactly as it was.
    pub fn upsert_document(
        &mut self,
        document: Document,
        inputs: Vec<ChunkInput>,
    ) -> Result<(), CorpusError> {
        let mut dimension = self.dimension;
        for input in &inputs {
            let chunk = &input.chunk;
            if chunk.document_id != document.id {
                return Err(CorpusError::ForeignChunk {
                    chunk: chunk.id,
                    claimed: chunk.document_id,
                    owner: document.id,
                });
            }
            if let Some(slot) = self.chunks.get(&chunk.id) {
                if slot.chunk.document_id != document.id {
                    return Err(CorpusError::DuplicateChunk(chunk.id));
                }
            }
            if let Some(embedding) = &input.embedding {
                let expected = *dimension.get_or_insert(embedding.len());
                if embedding.len() != expected {
                    return Err(CorpusError::DimensionMismatch {
                        chunk: chunk.id,
                        expected,
                        actual: embedding.len(),
                    });
                }
                if !embedding.iter().all(|v| v.is_finite()) {
                    return Err(CorpusError::NonFiniteEmbedding(chunk.id));
                }
            }
        }
        let mut seen = std::collections::HashSet::with_capacity(inputs.len());
        for input in &inputs {
            if !seen.insert(input.chunk.id) {
                return Err(CorpusError::DuplicateChunk(input.chunk.id));
            }
        }

        self.dimension = dimension;
        self.remove_document(&document.id);

        let mut chunk_ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            let mut chunk = input.chunk;
            chunk.document_version = document.version;
            chunk.document_metadata = document.metadata.clone();
            chunk_ids.push(chunk.id);
            self.chunks.insert(
                chunk.id,
                ChunkSlot {
                    chunk: Arc::new(chunk),
                    embedding: input.embedding.map(Arc::from),
                },
            );
        }

        debug!(
            document = %document.id,
            version = document.version,
            chunks = chunk_ids.len(),
            "stored document"
        );
        self.documents
            .insert(document.id, DocumentEntry { document, chunk_ids });
        Ok(())
    }

    /// Remove a document together with every chunk and vector it owns.
    pub fn remove_document(&mut self, id: &DocumentId) -> Option<Document> {
        let entry = self.documents.remove(id)?;
        for chunk_id in &entry.chunk_ids {
            self.chunks.remove(chunk_id);
        }
        Some(entry.document)
    }

    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.get(id).map(|e| &e.document)
    }

    pub fn chunk(&self, id: &ChunkId) -> Option<Arc<Chunk>> {
        self.chunks.get(id).map(|slot| slot.chunk.clone())
    }

    pub fn embedding(&self, id: &ChunkId) -> Option<&[f32]> {
        self.chunks.get(id).and_then(|slot| slot.embedding.as_deref())
    }

    /// Chunks of a document in ordinal order.
    pub fn chunks_of(&self, id: &DocumentId) -> Vec<Arc<Chunk>> {
        self.documents
            .get(id)
            .map(|entry| {
                entry
                    .chunk_ids
                    .iter()
                    .filter_map(|cid| self.chunk(cid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every stored chunk with its embedding, in no particular order.
    pub fn iter_chunks(&self) -> impl Iterator<Item = (&Arc<Chunk>, Option<&[f32]>)> {
        self.chunks
            .values()
            .map(|slot| (&slot.chunk, slot.embedding.as_deref()))
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            documents: self.documents.len(),
            chunks: self.chunks.len(),
            embedded_chunks: self
                .chunks
                .values()
                .filter(|slot| slot.embedding.is_some())
                .count(),
            dimension: self.dimension,
        }
    }

    /// Load a pre-built snapshot: one [`CorpusRecord`] JSON object per line.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let mut corpus = Corpus::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: CorpusRecord =
                serde_json::from_str(&line).map_err(|e| CorpusError::InvalidRecord {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            let (document, inputs) = record.into_parts();
            corpus.upsert_document(document, inputs)?;
        }
        let stats = corpus.stats();
        info!(
            path = %path.display(),
            documents = stats.documents,
            chunks = stats.chunks,
            "loaded corpus snapshot"
        );
        Ok(corpus)
    }
}

/// On-disk shape of one document in a corpus snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub document: Document,
    #[serde(default)]
    pub chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    #[serde(default)]
    pub id: Option<ChunkId>,
    pub ordinal: u32,
    #[serde(default)]
    pub heading: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl CorpusRecord {
    pub fn into_parts(self) -> (Document, Vec<ChunkInput>) {
        let document = self.document;
        let inputs = self
            .chunks
            .into_iter()
            .map(|record| {
                let mut chunk = Chunk::new(&document, record.ordinal, record.text);
                if let Some(id) = record.id {
                    chunk.id = id;
                }
                chunk.heading = record.heading;
                chunk.metadata = record.metadata;
                ChunkInput {
                    chunk,
                    embedding: record.embedding,
                }
            })
            .collect();
        (document, inputs)
    }
}

/// The narrow "corpus is queryable" contract the query path depends on.
///
/// How and when the corpus gets populated is not the query path's concern.
pub trait CorpusStatus: Send + Sync {
    fn is_queryable(&self) -> bool;
    fn stats(&self) -> CorpusStats;
}

/// Publishes immutable corpus snapshots to concurrent readers.
pub struct CorpusHandle {
    current: ArcSwap<Corpus>,
    ready: AtomicBool,
    writer: Mutex<()>,
}

impl CorpusHandle {
    /// An empty handle that reports not-queryable until something is published.
    pub fn empty() -> Self {
        Self {
            current: ArcSwap::from_pointee(Corpus::new()),
            ready: AtomicBool::new(false),
            writer: Mutex::new(()),
        }
    }

    pub fn new(corpus: Corpus) -> Self {
        let handle = Self::empty();
        handle.publish(corpus);
        handle
    }

    /// The snapshot a single query should read from start to finish.
    pub fn snapshot(&self) -> Arc<Corpus> {
        self.current.load_full()
    }

    pub fn publish(&self, corpus: Corpus) {
        let _guard = self.writer.lock();
        self.current.store(Arc::new(corpus));
        self.ready.store(true, Ordering::Release);
    }

    /// Copy-on-write mutation. Readers keep their old snapshot until they
    /// take a new one.
    pub fn update<F>(&self, mutate: F) -> Result<(), CorpusError>
    where
        F: FnOnce(&mut Corpus) -> Result<(), CorpusError>,
    {
        let _guard = self.writer.lock();
        let mut next = Corpus::clone(&self.current.load());
        mutate(&mut next)?;
        self.current.store(Arc::new(next));
        Ok(())
    }

    pub fn mark_unavailable(&self) {
        self.ready.store(false, Ordering::Release);
    }
}

impl CorpusStatus for CorpusHandle {
    fn is_queryable(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn stats(&self) -> CorpusStats {
        self.current.load().stats()
    }
}
