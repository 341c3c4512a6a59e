use crate::embedding::{Embedder, HashingEmbedder};
use crate::gated::{GatedEmbedder, GatedProvider, ProviderGate};
use crate::llm_provider::LLMProvider;
use crate::openai_compatible_provider::{
    OpenAICompatibleConfig, OpenAICompatibleEmbedder, OpenAICompatibleProvider,
};
use anyhow::{Context, Result};
use askgate_core::{EmbeddingBackend, Settings};
use std::sync::Arc;
use tracing::info;

/// Providers ready for the pipeline, already behind one shared gate.
#[derive(Clone)]
pub struct ModelStack {
    pub llm: Arc<dyn LLMProvider>,
    pub embedder: Arc<dyn Embedder>,
    pub gate: ProviderGate,
}

impl ModelStack {
    /// Wrap raw providers with a gate built from the generation settings.
    pub fn gated(
        llm: Arc<dyn LLMProvider>,
        embedder: Arc<dyn Embedder>,
        gate: ProviderGate,
    ) -> Self {
        Self {
            llm: Arc::new(GatedProvider::new(llm, gate.clone())),
            embedder: Arc::new(GatedEmbedder::new(embedder, gate.clone())),
            gate,
        }
    }
}

/// Builds the model stack described by [`Settings`].
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_from_settings(settings: &Settings) -> Result<ModelStack> {
        let generation = &settings.generation;
        let gate = ProviderGate::new(generation.concurrency_limit, generation.call_timeout());
        let config =
            OpenAICompatibleConfig::from_settings(&settings.provider, generation.call_timeout());

        let llm: Arc<dyn LLMProvider> = Arc::new(
            OpenAICompatibleProvider::new(config.clone())
                .context("failed to create chat provider")?,
        );

        let embedder: Arc<dyn Embedder> = match settings.provider.embedding_backend {
            EmbeddingBackend::OpenaiCompatible => Arc::new(
                OpenAICompatibleEmbedder::new(config, settings.provider.embedding_dimension)
                    .context("failed to create embedding provider")?,
            ),
            EmbeddingBackend::Hashing => {
                Arc::new(HashingEmbedder::new(settings.provider.embedding_dimension))
            }
        };

        info!(
            "model stack: chat={} via {}, embeddings={} ({} dims), concurrency_limit={}",
            settings.provider.chat_model,
            settings.provider.base_url,
            embedder.provider_name(),
            embedder.dimension(),
            gate.limit()
        );
        Ok(ModelStack::gated(llm, embedder, gate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_backend_needs_no_network() {
        let mut settings = Settings::default();
        settings.provider.embedding_backend = EmbeddingBackend::Hashing;
        settings.provider.embedding_dimension = 32;
        settings.generation.concurrency_limit = 4;

        let stack = ProviderFactory::create_from_settings(&settings).unwrap();
        assert_eq!(stack.embedder.provider_name(), "hashing");
        assert_eq!(stack.embedder.dimension(), 32);
        assert_eq!(stack.gate.limit(), 4);
        assert_eq!(stack.llm.model_name(), "gpt-4o-mini");
    }
}
