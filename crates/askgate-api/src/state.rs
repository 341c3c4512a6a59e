use anyhow::{bail, Context, Result};
use askgate_ai::ProviderFactory;
use askgate_core::{Corpus, CorpusHandle, CorpusStatus, Settings};
use askgate_rag::{Orchestrator, OrchestratorDeps};
use askgate_retrieval::{InMemoryLexicalIndex, InMemoryVectorIndex};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub corpus: Arc<dyn CorpusStatus>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, settings: Arc<Settings>) -> Self {
        Self {
            corpus: orchestrator.corpus().clone(),
            orchestrator,
            settings,
        }
    }

    /// Wire the production stack: corpus snapshot, in-memory indexes,
    /// OpenAI-compatible providers and the model-backed judge.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let handle = Arc::new(load_corpus(&settings)?);
        let models = ProviderFactory::create_from_settings(&settings)?;

        let orchestrator = Orchestrator::new(
            &settings,
            OrchestratorDeps {
                corpus: handle.clone(),
                embedder: models.embedder,
                vector: Arc::new(InMemoryVectorIndex::new(handle.clone())),
                lexical: Arc::new(InMemoryLexicalIndex::new(handle)),
                llm: models.llm,
                judge: None,
            },
        );
        Ok(Self::new(Arc::new(orchestrator), Arc::new(settings)))
    }
}

fn load_corpus(settings: &Settings) -> Result<CorpusHandle> {
    let Some(path) = &settings.corpus.path else {
        warn!("no corpus.path configured; /ask will report the corpus as unavailable");
        return Ok(CorpusHandle::empty());
    };

    let corpus = Corpus::load_jsonl(path)
        .with_context(|| format!("failed to load corpus snapshot {}", path.display()))?;
    if let Some(dimension) = corpus.dimension() {
        if dimension != settings.provider.embedding_dimension {
            bail!(
                "corpus vectors have {} dimensions but provider.embedding_dimension is {}",
                dimension,
                settings.provider.embedding_dimension
            );
        }
    }

    let stats = corpus.stats();
    info!(
        "loaded corpus from {}: {} documents, {} chunks ({} embedded)",
        path.display(),
        stats.documents,
        stats.chunks,
        stats.embedded_chunks
    );
    Ok(CorpusHandle::new(corpus))
}
