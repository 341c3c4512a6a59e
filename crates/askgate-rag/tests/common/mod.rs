#![allow(dead_code)]

use askgate_ai::{Embedder, HashingEmbedder, MockEmbedder, MockLLMProvider, ModelStack, ProviderGate};
use askgate_core::{
    Chunk, ChunkInput, Corpus, CorpusHandle, Document, MetadataFilter, ScoredChunk, Settings,
};
use askgate_rag::{Judge, MockJudge, Orchestrator, OrchestratorDeps};
use askgate_retrieval::{
    InMemoryLexicalIndex, InMemoryVectorIndex, LexicalSearch, RetrievalError, VectorSearch,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const DIM: usize = 64;

/// Backend that returns a fixed list, optionally late or failing.
pub struct StubSearch {
    hits: Vec<ScoredChunk>,
    delay: Duration,
    error: Option<RetrievalError>,
}

impl StubSearch {
    pub fn returning(hits: Vec<ScoredChunk>) -> Self {
        Self {
            hits,
            delay: Duration::ZERO,
            error: None,
        }
    }

    pub fn stalling(delay: Duration) -> Self {
        Self {
            hits: Vec::new(),
            delay,
            error: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Vec::new(),
            delay: Duration::ZERO,
            error: Some(RetrievalError::search(message)),
        }
    }

    async fn respond(&self, limit: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.hits.iter().take(limit).cloned().collect()),
        }
    }
}

#[async_trait]
impl VectorSearch for StubSearch {
    async fn search(
        &self,
        _vector: &[f32],
        _filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.respond(limit).await
    }

    fn backend_name(&self) -> &str {
        "stub"
    }
}

#[async_trait]
impl LexicalSearch for StubSearch {
    async fn search(
        &self,
        _query: &str,
        _filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.respond(limit).await
    }

    fn backend_name(&self) -> &str {
        "stub"
    }
}

pub struct Fixture {
    pub handle: Arc<CorpusHandle>,
    pub chunks: Vec<Arc<Chunk>>,
}

impl Fixture {
    /// One document, one chunk per text, embedded with the hashing embedder.
    pub fn new(texts: &[&str]) -> Self {
        let embedder = HashingEmbedder::new(DIM);
        let doc = Document::new("file:///kb/handbook.md");
        let inputs: Vec<ChunkInput> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                ChunkInput::new(Chunk::new(&doc, i as u32, *text))
                    .with_embedding(embedder.embed_sync(text))
            })
            .collect();
        let mut corpus = Corpus::with_dimension(DIM);
        corpus
            .upsert_document(doc.clone(), inputs)
            .expect("fixture corpus");
        let chunks = corpus.chunks_of(&doc.id);
        Self {
            handle: Arc::new(CorpusHandle::new(corpus)),
            chunks,
        }
    }

    pub fn chunk_with(&self, needle: &str) -> Arc<Chunk> {
        self.chunks
            .iter()
            .find(|c| c.text.contains(needle))
            .cloned()
            .expect("fixture chunk")
    }

    pub fn scored(&self, needles: &[&str]) -> Vec<ScoredChunk> {
        needles
            .iter()
            .enumerate()
            .map(|(i, n)| ScoredChunk::new(self.chunk_with(n), 0.9 - i as f32 * 0.1))
            .collect()
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.provider.embedding_dimension = DIM;
    settings.retrieval.semantic_timeout_ms = 200;
    settings.retrieval.lexical_timeout_ms = 200;
    settings.retrieval.embedding_timeout_ms = 200;
    settings.retrieval.rerank_final_k = 4;
    settings.generation.retry.max_attempts = 2;
    settings.generation.retry.base_delay_ms = 0;
    settings.generation.retry.max_delay_ms = 0;
    settings
}

pub struct Wiring {
    pub settings: Settings,
    pub embedder: Arc<dyn Embedder>,
    pub vector: Option<Arc<dyn VectorSearch>>,
    pub lexical: Option<Arc<dyn LexicalSearch>>,
    pub llm: Arc<MockLLMProvider>,
    pub judge: Arc<MockJudge>,
}

impl Wiring {
    pub fn new(llm: MockLLMProvider) -> Self {
        Self {
            settings: test_settings(),
            embedder: Arc::new(MockEmbedder::new(DIM)),
            vector: None,
            lexical: None,
            llm: Arc::new(llm),
            judge: Arc::new(MockJudge::default()),
        }
    }

    pub fn judge(mut self, judge: MockJudge) -> Self {
        self.judge = Arc::new(judge);
        self
    }

    pub fn vector(mut self, vector: impl VectorSearch + 'static) -> Self {
        self.vector = Some(Arc::new(vector));
        self
    }

    pub fn lexical(mut self, lexical: impl LexicalSearch + 'static) -> Self {
        self.lexical = Some(Arc::new(lexical));
        self
    }

    pub fn embedder(mut self, embedder: impl Embedder + 'static) -> Self {
        self.embedder = Arc::new(embedder);
        self
    }

    /// Unset backends default to the in-memory indexes over `fixture`.
    pub fn build(self, fixture: &Fixture) -> Orchestrator {
        let gate = ProviderGate::new(
            self.settings.generation.concurrency_limit,
            self.settings.generation.call_timeout(),
        );
        let stack = ModelStack::gated(self.llm.clone(), self.embedder, gate);
        let vector = self
            .vector
            .unwrap_or_else(|| {
                Arc::new(InMemoryVectorIndex::new(fixture.handle.clone())) as Arc<dyn VectorSearch>
            });
        let lexical = self
            .lexical
            .unwrap_or_else(|| {
                Arc::new(InMemoryLexicalIndex::new(fixture.handle.clone())) as Arc<dyn LexicalSearch>
            });
        let judge: Arc<dyn Judge> = self.judge;
        Orchestrator::new(
            &self.settings,
            OrchestratorDeps {
                corpus: fixture.handle.clone(),
                embedder: stack.embedder,
                vector,
                lexical,
                llm: stack.llm,
                judge: Some(judge),
            },
        )
    }
}

pub const HANDBOOK: &[&str] = &[
    "Customers may request a refund within 30 days of purchase. The refund window is 30 days.",
    "Shipping is free for orders above 50 euros.",
    "Pumps should be serviced every twelve months by a certified technician.",
    "Replacement cartridge XK-4471B ships in packs of two.",
    "Support is available on weekdays from 9am to 5pm.",
];
