use crate::embedding::Embedder;
use crate::llm_provider::*;
use crate::{ProviderError, ProviderResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// Shared admission control for outbound model calls.
///
/// Every gated call holds one permit for its whole duration, so at most
/// `limit` calls are in flight across all concurrent requests. Waiting for a
/// permit is not bounded here; the caller's request deadline covers it.
#[derive(Debug, Clone)]
pub struct ProviderGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
    call_timeout: Duration,
}

impl ProviderGate {
    pub fn new(limit: usize, call_timeout: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            call_timeout,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }

    pub async fn run<T, Fut>(&self, call: Fut) -> ProviderResult<T>
    where
        Fut: Future<Output = ProviderResult<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::fatal("provider gate closed"))?;
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!("provider call exceeded {:?}", self.call_timeout);
                Err(ProviderError::Timeout(self.call_timeout))
            }
        }
    }
}

/// [`LLMProvider`] wrapper that routes every call through a [`ProviderGate`].
pub struct GatedProvider {
    inner: Arc<dyn LLMProvider>,
    gate: ProviderGate,
}

impl GatedProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, gate: ProviderGate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &ProviderGate {
        &self.gate
    }
}

#[async_trait]
impl LLMProvider for GatedProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> ProviderResult<LLMResponse> {
        self.gate
            .run(self.inner.generate_chat(messages, config))
            .await
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// [`Embedder`] wrapper sharing the same gate as generation.
pub struct GatedEmbedder {
    inner: Arc<dyn Embedder>,
    gate: ProviderGate,
}

impl GatedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, gate: ProviderGate) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl Embedder for GatedEmbedder {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.gate.run(self.inner.embed(text)).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}
