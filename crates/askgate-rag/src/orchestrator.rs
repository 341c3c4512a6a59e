use crate::generator::DraftGenerator;
use crate::prompts::INSUFFICIENT_CONTEXT_MESSAGE;
use crate::validation::{
    Judge, LlmJudge, PartialRetrieval, RetrievalPath, ValidationPipeline, ValidationReport,
};
use askgate_ai::{Embedder, GenerationConfig, LLMProvider, RetryPolicy};
use askgate_core::{
    AskError, ChunkId, CorpusStatus, FusionConfig, MetadataFilter, Result, RetrievalSettings,
    RiskProfile, ScoredChunk, Settings,
};
use askgate_retrieval::{fuse, LexicalSearch, RetrievalError, VectorSearch};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// One question, with its per-request knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Overrides `rerank_final_k` for this request.
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub risk_profile: RiskProfile,
    #[serde(default)]
    pub filters: MetadataFilter,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_risk_profile(mut self, profile: RiskProfile) -> Self {
        self.risk_profile = profile;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = filters;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestTimings {
    pub embedding_ms: u64,
    pub retrieval_ms: u64,
    pub generation_ms: u64,
    pub validation_ms: u64,
    pub total_ms: u64,
}

/// The only thing a caller ever gets back from a successful request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResult {
    pub answer: String,
    /// Chunk ids in fused-rank order; never more than the request's final k.
    pub citations: Vec<ChunkId>,
    pub validation_report: ValidationReport,
    pub timings: RequestTimings,
}

/// Collaborators the orchestrator is wired from.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub corpus: Arc<dyn CorpusStatus>,
    pub embedder: Arc<dyn Embedder>,
    pub vector: Arc<dyn VectorSearch>,
    pub lexical: Arc<dyn LexicalSearch>,
    pub llm: Arc<dyn LLMProvider>,
    /// Defaults to an [`LlmJudge`] over `llm`.
    pub judge: Option<Arc<dyn Judge>>,
}

enum BackendOutcome {
    Hits(Vec<ScoredChunk>),
    TimedOut(Duration),
    Failed(String),
    Skipped(String),
}

impl BackendOutcome {
    fn reason(&self) -> String {
        match self {
            BackendOutcome::Hits(_) => String::new(),
            BackendOutcome::TimedOut(limit) => format!("timed out after {limit:?}"),
            BackendOutcome::Failed(reason) | BackendOutcome::Skipped(reason) => reason.clone(),
        }
    }
}

/// Runs one request end to end: embed, retrieve both paths, fuse, draft, validate.
pub struct Orchestrator {
    deps: OrchestratorDeps,
    generator: DraftGenerator,
    pipeline: ValidationPipeline,
    retrieval: RetrievalSettings,
    fusion: FusionConfig,
    retry: RetryPolicy,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(settings: &Settings, deps: OrchestratorDeps) -> Self {
        let retry = RetryPolicy::from(&settings.generation.retry);
        let generation = GenerationConfig::from(&settings.generation);
        let judge = deps
            .judge
            .clone()
            .unwrap_or_else(|| {
                Arc::new(LlmJudge::new(deps.llm.clone(), generation.clone())) as Arc<dyn Judge>
            });

        Self {
            generator: DraftGenerator::new(deps.llm.clone(), generation, retry.clone()),
            pipeline: ValidationPipeline::new(judge, settings.validation.clone(), retry.clone()),
            retrieval: settings.retrieval.clone(),
            fusion: settings.fusion.clone(),
            deadline: settings.generation.request_deadline(),
            retry,
            deps,
        }
    }

    pub fn corpus(&self) -> &Arc<dyn CorpusStatus> {
        &self.deps.corpus
    }

    /// Answer `request` or fail with a stable error kind.
    ///
    /// Dropping the returned future, or hitting the request deadline, drops
    /// every in-flight sub-call with it.
    #[instrument(skip(self, request), fields(profile = %request.risk_profile))]
    pub async fn ask(&self, request: AskRequest) -> Result<AskResult> {
        Self::check(&request)?;
        match tokio::time::timeout(self.deadline, self.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("request deadline of {:?} exceeded", self.deadline);
                Err(AskError::DeadlineExceeded(self.deadline))
            }
        }
    }

    fn check(request: &AskRequest) -> Result<()> {
        if request.question.trim().is_empty() {
            return Err(AskError::invalid_request("question must not be empty"));
        }
        if request.top_k == Some(0) {
            return Err(AskError::invalid_request("top_k must be positive"));
        }
        request.filters.validate()
    }

    async fn run(&self, request: AskRequest) -> Result<AskResult> {
        let started = Instant::now();
        let mut timings = RequestTimings::default();
        let question = request.question.trim();
        let final_k = request.top_k.unwrap_or(self.retrieval.rerank_final_k);

        if !self.deps.corpus.is_queryable() {
            return Err(AskError::CorpusUnavailable(
                "corpus is not ready for queries".to_string(),
            ));
        }

        let step = Instant::now();
        let embedding = self.embed(question).await;
        timings.embedding_ms = elapsed_ms(step);
        let semantic_input = match embedding {
            Ok(vector) => Ok(vector),
            Err(err) if self.retrieval.allow_lexical_only => {
                warn!("embedding failed, continuing lexical-only: {}", err);
                Err(err.to_string())
            }
            Err(err) => return Err(err),
        };

        let step = Instant::now();
        let (semantic, lexical) = self
            .retrieve(question, semantic_input, &request.filters)
            .await;
        let (semantic, lexical, partial) = self.resolve(semantic, lexical)?;
        timings.retrieval_ms = elapsed_ms(step);

        let context = fuse(&semantic, &lexical, &self.fusion, final_k);
        if context.is_empty() {
            info!("no context retrieved; returning insufficient-context answer");
            timings.total_ms = elapsed_ms(started);
            return Ok(AskResult {
                answer: INSUFFICIENT_CONTEXT_MESSAGE.to_string(),
                citations: Vec::new(),
                validation_report: ValidationReport::insufficient_context(
                    request.risk_profile,
                    partial,
                ),
                timings,
            });
        }

        let step = Instant::now();
        let draft = self.generator.draft(question, &context).await?;
        timings.generation_ms = elapsed_ms(step);

        let step = Instant::now();
        let validated = self
            .pipeline
            .validate(question, draft, &context, request.risk_profile, &self.generator)
            .await?;
        timings.validation_ms = elapsed_ms(step);
        timings.total_ms = elapsed_ms(started);

        let mut report = validated.report;
        report.partial_retrieval = partial;
        info!(
            decision = %report.decision,
            unsupported = report.unsupported_count,
            citations = validated.citations.len(),
            total_ms = timings.total_ms,
            "request completed"
        );
        Ok(AskResult {
            answer: validated.answer,
            citations: validated.citations,
            validation_report: report,
            timings,
        })
    }

    async fn embed(&self, question: &str) -> Result<Vec<f32>> {
        let limit = self.retrieval.embedding_timeout();
        let vector = self
            .retry
            .run("embedding", |_| async move {
                match tokio::time::timeout(limit, self.deps.embedder.embed(question)).await {
                    Ok(result) => result,
                    Err(_) => Err(askgate_ai::ProviderError::Timeout(limit)),
                }
            })
            .await
            .map_err(|e| AskError::embedding(e.to_string()))?;
        if vector.is_empty() {
            return Err(AskError::embedding("provider returned an empty vector"));
        }
        if !vector.iter().all(|v| v.is_finite()) {
            return Err(AskError::embedding("provider returned NaN or infinite values"));
        }
        Ok(vector)
    }

    /// Both paths run concurrently on this task; each has its own timeout.
    async fn retrieve(
        &self,
        question: &str,
        semantic_input: std::result::Result<Vec<f32>, String>,
        filters: &MetadataFilter,
    ) -> (BackendOutcome, BackendOutcome) {
        let semantic = async {
            match &semantic_input {
                Ok(vector) => {
                    bounded(
                        self.retrieval.semantic_timeout(),
                        self.deps
                            .vector
                            .search(vector, filters, self.retrieval.semantic_top_k),
                    )
                    .await
                }
                Err(reason) => BackendOutcome::Skipped(format!("no query embedding: {reason}")),
            }
        };
        let lexical = bounded(
            self.retrieval.lexical_timeout(),
            self.deps
                .lexical
                .search(question, filters, self.retrieval.keyword_top_k),
        );
        tokio::join!(semantic, lexical)
    }

    fn resolve(
        &self,
        semantic: BackendOutcome,
        lexical: BackendOutcome,
    ) -> Result<(Vec<ScoredChunk>, Vec<ScoredChunk>, Option<PartialRetrieval>)> {
        use BackendOutcome::*;
        match (semantic, lexical) {
            (Hits(s), Hits(l)) => {
                debug!("retrieval: {} semantic, {} lexical", s.len(), l.len());
                Ok((s, l, None))
            }
            (Hits(s), lost) => {
                warn!("lexical search lost: {}", lost.reason());
                Ok((s, Vec::new(), Some(partial(RetrievalPath::Lexical, &lost))))
            }
            (lost, Hits(l)) => {
                warn!("semantic search lost: {}", lost.reason());
                Ok((Vec::new(), l, Some(partial(RetrievalPath::Semantic, &lost))))
            }
            (TimedOut(_), TimedOut(_)) => Err(AskError::RetrievalTimeout {
                semantic: self.retrieval.semantic_timeout(),
                lexical: self.retrieval.lexical_timeout(),
            }),
            (Skipped(_), TimedOut(_)) => Err(AskError::RetrievalTimeout {
                semantic: self.retrieval.embedding_timeout(),
                lexical: self.retrieval.lexical_timeout(),
            }),
            (semantic, lexical) => Err(AskError::RetrievalFailed {
                semantic: semantic.reason(),
                lexical: lexical.reason(),
            }),
        }
    }
}

async fn bounded<F>(limit: Duration, search: F) -> BackendOutcome
where
    F: Future<Output = std::result::Result<Vec<ScoredChunk>, RetrievalError>>,
{
    match tokio::time::timeout(limit, search).await {
        Ok(Ok(hits)) => BackendOutcome::Hits(hits),
        Ok(Err(err)) => BackendOutcome::Failed(err.to_string()),
        Err(_) => BackendOutcome::TimedOut(limit),
    }
}

fn partial(missing: RetrievalPath, outcome: &BackendOutcome) -> PartialRetrieval {
    PartialRetrieval {
        missing,
        reason: outcome.reason(),
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
