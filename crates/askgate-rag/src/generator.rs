use crate::prompts;
use askgate_ai::{GenerationConfig, LLMProvider, Message, ProviderError, RetryError, RetryPolicy};
use askgate_core::{AskError, Result};
use askgate_retrieval::FusedContext;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Produces draft answers from the question and the fused context.
///
/// Transient provider failures are retried under the [`RetryPolicy`]; once the
/// budget is spent the request fails with `ProviderError`.
pub struct DraftGenerator {
    provider: Arc<dyn LLMProvider>,
    config: GenerationConfig,
    retry: RetryPolicy,
}

impl DraftGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: GenerationConfig, retry: RetryPolicy) -> Self {
        Self {
            provider,
            config,
            retry,
        }
    }

    #[instrument(skip_all, fields(context = context.len()))]
    pub async fn draft(&self, question: &str, context: &FusedContext) -> Result<String> {
        let prompt = prompts::draft_prompt(question, context);
        self.complete("draft", prompt).await
    }

    /// Second and final attempt after the gatekeeper rejected `previous`.
    #[instrument(skip_all, fields(context = context.len()))]
    pub async fn regenerate(
        &self,
        question: &str,
        context: &FusedContext,
        previous: &str,
        reason: &str,
    ) -> Result<String> {
        let prompt = prompts::regeneration_prompt(question, context, previous, reason);
        self.complete("regeneration", prompt).await
    }

    async fn complete(&self, op: &str, prompt: String) -> Result<String> {
        let messages = [Message::system(prompts::DRAFT_SYSTEM), Message::user(prompt)];
        let response = self
            .retry
            .run(op, |_| self.provider.generate_chat(&messages, &self.config))
            .await
            .map_err(provider_failure)?;
        debug!("{} produced {} chars", op, response.content.len());
        Ok(response.content.trim().to_string())
    }
}

pub(crate) fn provider_failure(err: RetryError) -> AskError {
    match err.last {
        ProviderError::Fatal(message) => AskError::ProviderFatal(message),
        other => AskError::ProviderError {
            attempts: err.attempts,
            message: other.to_string(),
        },
    }
}
