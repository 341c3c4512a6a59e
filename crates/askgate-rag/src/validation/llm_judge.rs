use super::judge::{GateVerdict, Judge, ProposedClaim};
use crate::prompts;
use askgate_ai::{GenerationConfig, LLMProvider, Message, ProviderError, ProviderResult};
use askgate_core::ChunkId;
use askgate_retrieval::FusedContext;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Judge backed by the generation provider.
pub struct LlmJudge {
    provider: Arc<dyn LLMProvider>,
    config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GateReply {
    ok: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct AuditReply {
    #[serde(default)]
    claims: Vec<AuditClaim>,
}

#[derive(Debug, Deserialize)]
struct AuditClaim {
    text: String,
    #[serde(default)]
    evidence: Vec<Value>,
}

impl LlmJudge {
    pub fn new(provider: Arc<dyn LLMProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    async fn ask_json<T: DeserializeOwned>(&self, prompt: String) -> ProviderResult<T> {
        let messages = [Message::system(prompts::JUDGE_SYSTEM), Message::user(prompt)];
        let response = self.provider.generate_chat(&messages, &self.config).await?;
        parse_reply(&response.content)
    }
}

#[async_trait]
impl Judge for LlmJudge {
    #[instrument(skip_all)]
    async fn gatekeep(&self, question: &str, draft: &str) -> ProviderResult<GateVerdict> {
        let reply: GateReply = self
            .ask_json(prompts::gatekeeper_prompt(question, draft))
            .await?;
        Ok(GateVerdict {
            passed: reply.ok,
            reason: reply.reason,
        })
    }

    #[instrument(skip_all, fields(context = context.len()))]
    async fn audit(&self, draft: &str, context: &FusedContext) -> ProviderResult<Vec<ProposedClaim>> {
        let reply: AuditReply = self.ask_json(prompts::auditor_prompt(draft, context)).await?;
        debug!("auditor proposed {} claims", reply.claims.len());
        Ok(reply
            .claims
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .map(|c| ProposedClaim {
                evidence: c
                    .evidence
                    .iter()
                    .filter_map(|e| resolve_evidence(e, context))
                    .collect(),
                text: c.text.trim().to_string(),
            })
            .collect())
    }

    #[instrument(skip_all)]
    async fn rewrite(
        &self,
        question: &str,
        retained: &[String],
        dropped: &[String],
        context: &FusedContext,
    ) -> ProviderResult<String> {
        let messages = [Message::user(prompts::rewrite_prompt(
            question, retained, dropped, context,
        ))];
        let response = self.provider.generate_chat(&messages, &self.config).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(ProviderError::transient("rewrite came back empty"));
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "llm"
    }
}

// Passage numbers are 1-based fused ranks; raw chunk ids are accepted too.
fn resolve_evidence(value: &Value, context: &FusedContext) -> Option<ChunkId> {
    let by_rank = |n: u64| {
        context
            .candidates
            .iter()
            .find(|c| c.rank as u64 == n)
            .map(|c| c.id())
    };
    match value {
        Value::Number(n) => by_rank(n.as_u64()?),
        Value::String(s) => {
            let s = s.trim().trim_start_matches('[').trim_end_matches(']');
            match s.parse::<u64>() {
                Ok(n) => by_rank(n),
                Err(_) => s.parse::<ChunkId>().ok(),
            }
        }
        _ => None,
    }
}

/// Parse the first JSON object found in a model reply.
///
/// Models wrap JSON in prose or code fences; anything that still does not
/// parse is reported as transient so the caller's retry policy applies.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> ProviderResult<T> {
    let object = first_json_object(reply)
        .ok_or_else(|| ProviderError::transient("judge reply contains no JSON object"))?;
    serde_json::from_str(object)
        .map_err(|e| ProviderError::transient(format!("judge reply is not valid JSON: {e}")))
}

fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
