use crate::search::{sort_and_truncate, LexicalSearch};
use crate::text::tokenize;
use crate::Result;
use askgate_core::{CorpusHandle, MetadataFilter, ScoredChunk};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// BM25 over the chunks of a corpus snapshot.
///
/// Statistics (document frequency, average length) are computed over the
/// filtered subset only, so excluded chunks influence neither membership nor
/// scores.
pub struct InMemoryLexicalIndex {
    corpus: Arc<CorpusHandle>,
    params: Bm25Params,
}

impl InMemoryLexicalIndex {
    pub fn new(corpus: Arc<CorpusHandle>) -> Self {
        Self {
            corpus,
            params: Bm25Params::default(),
        }
    }

    pub fn with_params(corpus: Arc<CorpusHandle>, params: Bm25Params) -> Self {
        Self { corpus, params }
    }
}

#[async_trait]
impl LexicalSearch for InMemoryLexicalIndex {
    #[instrument(skip(self, filter))]
    async fn search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.corpus.snapshot();
        let docs: Vec<_> = snapshot
            .iter_chunks()
            .filter(|(chunk, _)| filter.matches(chunk))
            .map(|(chunk, _)| {
                let mut tokens = tokenize(&chunk.text);
                if let Some(heading) = &chunk.heading {
                    tokens.extend(tokenize(heading));
                }
                let len = tokens.len();
                let mut tf: HashMap<String, u32> = HashMap::new();
                for token in tokens {
                    if query_terms.contains(&token) {
                        *tf.entry(token).or_default() += 1;
                    }
                }
                (chunk, len, tf)
            })
            .collect();
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let n = docs.len() as f32;
        let avg_len = docs.iter().map(|(_, len, _)| *len as f32).sum::<f32>() / n;
        let mut df: HashMap<&str, u32> = HashMap::new();
        for (_, _, tf) in &docs {
            for term in tf.keys() {
                *df.entry(term.as_str()).or_default() += 1;
            }
        }

        let Bm25Params { k1, b } = self.params;
        let mut hits: Vec<ScoredChunk> = docs
            .iter()
            .filter(|(_, _, tf)| !tf.is_empty())
            .map(|(chunk, len, tf)| {
                let norm = if avg_len > 0.0 { *len as f32 / avg_len } else { 0.0 };
                let score: f32 = tf
                    .iter()
                    .map(|(term, &freq)| {
                        let df = df.get(term.as_str()).copied().unwrap_or(0) as f32;
                        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                        let freq = freq as f32;
                        idf * freq * (k1 + 1.0) / (freq + k1 * (1.0 - b + b * norm))
                    })
                    .sum();
                ScoredChunk::new((*chunk).clone(), score)
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        sort_and_truncate(&mut hits, limit);

        debug!("lexical search returned {} hits", hits.len());
        Ok(hits)
    }

    fn backend_name(&self) -> &str {
        "in-memory-bm25"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askgate_core::{Chunk, ChunkInput, Corpus, Document};
    use serde_json::json;

    fn index(texts: &[(&str, &str)]) -> (InMemoryLexicalIndex, Vec<Chunk>) {
        let mut corpus = Corpus::new();
        let mut chunks = Vec::new();
        for (department, text) in texts {
            let doc = Document::new("file:///kb.md").with_metadata("department", json!(department));
            let chunk = Chunk::new(&doc, 0, *text);
            chunks.push(chunk.clone());
            corpus
                .upsert_document(doc, vec![ChunkInput::new(chunk)])
                .unwrap();
        }
        (
            InMemoryLexicalIndex::new(Arc::new(CorpusHandle::new(corpus))),
            chunks,
        )
    }

    #[tokio::test]
    async fn exact_code_match_ranks_first() {
        let (index, chunks) = index(&[
            ("support", "The pump housing needs a filter replacement every year."),
            ("support", "Order part XK-4471B for the pump filter replacement."),
            ("support", "Filters and pumps are covered by warranty."),
        ]);
        let hits = index
            .search("which filter fits XK-4471B", &MetadataFilter::new(), 3)
            .await
            .unwrap();
        assert_eq!(hits[0].chunk.id, chunks[1].id);
    }

    #[tokio::test]
    async fn no_overlap_is_an_empty_ok() {
        let (index, _) = index(&[("hr", "holiday allowance")]);
        let hits = index
            .search("quantum chromodynamics", &MetadataFilter::new(), 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn filter_applies_before_ranking() {
        let (index, chunks) = index(&[
            ("hr", "expense policy expense expense"),
            ("finance", "expense policy"),
        ]);
        let filter = MetadataFilter::new().eq("department", json!("finance"));
        let hits = index.search("expense", &filter, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, chunks[1].id);
    }
}
