use crate::search::{sort_and_truncate, VectorSearch};
use crate::{Result, RetrievalError};
use askgate_core::{CorpusHandle, MetadataFilter, ScoredChunk};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Brute-force cosine search over the vectors held in a corpus snapshot.
pub struct InMemoryVectorIndex {
    corpus: Arc<CorpusHandle>,
}

impl InMemoryVectorIndex {
    pub fn new(corpus: Arc<CorpusHandle>) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl VectorSearch for InMemoryVectorIndex {
    #[instrument(skip(self, vector, filter), fields(dims = vector.len()))]
    async fn search(
        &self,
        vector: &[f32],
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if vector.is_empty() {
            return Err(RetrievalError::search("query vector is empty"));
        }
        if !vector.iter().all(|v| v.is_finite()) {
            return Err(RetrievalError::search("query vector contains NaN or infinite values"));
        }
        let snapshot = self.corpus.snapshot();
        let Some(expected) = snapshot.dimension() else {
            return Ok(Vec::new());
        };
        if vector.len() != expected {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<ScoredChunk> = snapshot
            .iter_chunks()
            .filter(|(chunk, _)| filter.matches(chunk))
            .filter_map(|(chunk, embedding)| {
                let embedding = embedding?;
                let distance = cosine_distance(vector, embedding);
                Some(ScoredChunk::new(chunk.clone(), 1.0 - distance))
            })
            .collect();
        sort_and_truncate(&mut hits, limit);

        debug!("vector search returned {} hits", hits.len());
        Ok(hits)
    }

    fn backend_name(&self) -> &str {
        "in-memory-vector"
    }
}

/// `1 - cosine_similarity`; zero vectors are maximally distant from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        1.0
    } else {
        1.0 - dot_product / (norm_a * norm_b)
    }
}
