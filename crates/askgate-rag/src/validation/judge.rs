use askgate_ai::ProviderResult;
use askgate_core::ChunkId;
use askgate_retrieval::FusedContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub passed: bool,
    pub reason: String,
}

impl GateVerdict {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// A claim as the judge sees it, with the context chunks it believes support it.
/// The pipeline re-checks every piece of evidence before trusting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedClaim {
    pub text: String,
    #[serde(default)]
    pub evidence: Vec<ChunkId>,
}

impl ProposedClaim {
    pub fn new(text: impl Into<String>, evidence: Vec<ChunkId>) -> Self {
        Self {
            text: text.into(),
            evidence,
        }
    }
}

/// The judgment calls of the validation pipeline.
///
/// Errors use the provider taxonomy so the pipeline can retry transient
/// failures (including unparseable model output) with its own policy.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Does `draft` actually address `question`?
    async fn gatekeep(&self, question: &str, draft: &str) -> ProviderResult<GateVerdict>;

    /// Decompose `draft` into atomic claims, citing context chunks.
    async fn audit(&self, draft: &str, context: &FusedContext) -> ProviderResult<Vec<ProposedClaim>>;

    /// Conservative answer built from `retained` claims only.
    async fn rewrite(
        &self,
        question: &str,
        retained: &[String],
        dropped: &[String],
        context: &FusedContext,
    ) -> ProviderResult<String>;

    fn name(&self) -> &str;
}
