use crate::Result;
use askgate_core::{MetadataFilter, ScoredChunk};
use async_trait::async_trait;

/// Nearest-neighbour search over chunk embeddings.
///
/// Implementations apply `filter` before ranking and return at most `limit`
/// hits ordered by similarity (higher is closer). An `Ok(vec![])` means no
/// permitted chunk matched; backend trouble must come back as `Err`.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    fn backend_name(&self) -> &str;
}

/// Keyword relevance search over raw chunk text. Same contract as [`VectorSearch`].
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    fn backend_name(&self) -> &str;
}

/// Descending score, then chunk id ascending, so equal scores never depend on
/// storage iteration order.
pub(crate) fn sort_and_truncate(hits: &mut Vec<ScoredChunk>, limit: usize) {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    hits.truncate(limit);
}
