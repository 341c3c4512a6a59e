use super::grounding::{has_content, normalize, GroundingCheck};
use super::judge::{GateVerdict, Judge};
use super::report::*;
use super::strategist::{Strategist, StrategistInput};
use crate::generator::DraftGenerator;
use crate::prompts::{REFUSAL_MESSAGE, UNCERTAINTY_NOTE};
use askgate_ai::{ProviderError, RetryError, RetryPolicy};
use askgate_core::{AskError, ChunkId, Result, RiskProfile, ValidationSettings};
use askgate_retrieval::FusedContext;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// What validation hands back: the releasable answer and its report.
#[derive(Debug, Clone)]
pub struct ValidatedAnswer {
    pub answer: String,
    pub citations: Vec<ChunkId>,
    pub report: ValidationReport,
}

/// Gatekeeper → Auditor → Strategist over one draft.
///
/// Judge failures are retried under the pipeline's [`RetryPolicy`]; once
/// exhausted the request fails with `ValidationInconclusive`. Nothing here
/// falls back to approving the draft.
pub struct ValidationPipeline {
    judge: Arc<dyn Judge>,
    grounding: GroundingCheck,
    strategist: Strategist,
    allow_regeneration: bool,
    retry: RetryPolicy,
}

impl ValidationPipeline {
    pub fn new(judge: Arc<dyn Judge>, settings: ValidationSettings, retry: RetryPolicy) -> Self {
        Self {
            judge,
            grounding: GroundingCheck::new(f64::from(settings.min_claim_coverage)),
            allow_regeneration: settings.allow_regeneration,
            strategist: Strategist::new(settings),
            retry,
        }
    }

    #[instrument(skip_all, fields(profile = %profile, judge = self.judge.name()))]
    pub async fn validate(
        &self,
        question: &str,
        draft: String,
        context: &FusedContext,
        profile: RiskProfile,
        generator: &DraftGenerator,
    ) -> Result<ValidatedAnswer> {
        let mut stages = vec![ValidationStage::Drafted];
        let mut draft = draft;

        let mut verdict = self.gatekeep(question, &draft).await?;
        let mut attempts = 1;
        let mut regenerated = false;
        stages.push(gate_stage(&verdict));

        if !verdict.passed && self.allow_regeneration {
            warn!("gatekeeper rejected draft: {}", verdict.reason);
            draft = generator
                .regenerate(question, context, &draft, &verdict.reason)
                .await?;
            regenerated = true;
            stages.push(ValidationStage::Regenerated);

            verdict = self.gatekeep(question, &draft).await?;
            attempts += 1;
            stages.push(gate_stage(&verdict));
        }
        if !verdict.passed {
            warn!("gatekeeper failed after {} attempt(s): {}", attempts, verdict.reason);
        }

        let claims = self.audit(&draft, context).await?;
        stages.push(ValidationStage::Audited);
        let supported = claims.iter().filter(|c| c.supported).count();
        let unsupported = claims.len() - supported;
        debug!("audited {} claims, {} unsupported", claims.len(), unsupported);

        let ruling = self.strategist.decide(
            profile,
            StrategistInput {
                gatekeeper_passed: verdict.passed,
                supported,
                unsupported,
                context_len: context.len(),
            },
        );
        stages.push(ValidationStage::Strategized);

        let mut decision = ruling.decision;
        let mut decision_reason = ruling.reason;
        let (answer, citations) = match decision {
            StrategistDecision::Approve => {
                let citations = if claims.is_empty() {
                    context.chunk_ids()
                } else {
                    cited_in_rank_order(context, claims.iter().filter(|c| c.supported))
                };
                (draft, citations)
            }
            StrategistDecision::Rewrite => {
                let retained: Vec<String> = claims
                    .iter()
                    .filter(|c| c.supported)
                    .map(|c| c.text.clone())
                    .collect();
                if retained.is_empty() {
                    decision = StrategistDecision::Refuse;
                    decision_reason = format!("{decision_reason}; nothing left to keep after rewrite");
                    (REFUSAL_MESSAGE.to_string(), Vec::new())
                } else {
                    let dropped: Vec<String> = claims
                        .iter()
                        .filter(|c| !c.supported)
                        .map(|c| c.text.clone())
                        .collect();
                    let text = self.rewrite(question, &retained, &dropped, context).await?;
                    let citations =
                        cited_in_rank_order(context, claims.iter().filter(|c| c.supported));
                    (finish_rewrite(text, &retained, &dropped), citations)
                }
            }
            StrategistDecision::Refuse => (REFUSAL_MESSAGE.to_string(), Vec::new()),
        };
        stages.push(ValidationStage::Final);

        Ok(ValidatedAnswer {
            answer,
            citations,
            report: ValidationReport {
                risk_profile: profile,
                gatekeeper: Some(GatekeeperReport {
                    passed: verdict.passed,
                    reason: verdict.reason,
                    attempts,
                    regenerated,
                }),
                unsupported_count: unsupported,
                claims,
                decision,
                decision_reason,
                partial_retrieval: None,
                insufficient_context: false,
                stages,
            },
        })
    }

    async fn gatekeep(&self, question: &str, draft: &str) -> Result<GateVerdict> {
        self.retry
            .run("gatekeeper", |_| self.judge.gatekeep(question, draft))
            .await
            .map_err(|e| judge_failure("gatekeeper", e))
    }

    /// Claims with grounding re-checked here; the judge cannot add support.
    async fn audit(&self, draft: &str, context: &FusedContext) -> Result<Vec<ClaimReport>> {
        let proposed = self
            .retry
            .run("auditor", |_| self.judge.audit(draft, context))
            .await
            .map_err(|e| judge_failure("auditor", e))?;

        let mut seen = HashSet::new();
        Ok(proposed
            .into_iter()
            .filter(|claim| has_content(&claim.text))
            .filter(|claim| seen.insert(normalize(&claim.text)))
            .map(|claim| {
                let mut evidence = self.grounding.verify(&claim.text, &claim.evidence, context);
                if evidence.is_empty() && !claim.evidence.is_empty() {
                    // judge pointed at the wrong passages; try the rest
                    evidence = self.grounding.verify(&claim.text, &[], context);
                }
                ClaimReport {
                    supported: !evidence.is_empty(),
                    text: claim.text,
                    evidence,
                }
            })
            .collect())
    }

    async fn rewrite(
        &self,
        question: &str,
        retained: &[String],
        dropped: &[String],
        context: &FusedContext,
    ) -> Result<String> {
        self.retry
            .run("rewrite", |_| {
                self.judge.rewrite(question, retained, dropped, context)
            })
            .await
            .map_err(|e| judge_failure("rewrite", e))
    }
}

fn gate_stage(verdict: &GateVerdict) -> ValidationStage {
    if verdict.passed {
        ValidationStage::GatekeptOk
    } else {
        ValidationStage::GatekeptFail
    }
}

fn judge_failure(stage: &str, err: RetryError) -> AskError {
    match err.last {
        ProviderError::Fatal(message) => AskError::ProviderFatal(message),
        other => AskError::inconclusive(
            stage,
            format!("{} (after {} attempt(s))", other, err.attempts),
        ),
    }
}

fn cited_in_rank_order<'a>(
    context: &FusedContext,
    claims: impl Iterator<Item = &'a ClaimReport>,
) -> Vec<ChunkId> {
    let cited: HashSet<ChunkId> = claims.flat_map(|c| c.evidence.iter().copied()).collect();
    context
        .candidates
        .iter()
        .map(|c| c.id())
        .filter(|id| cited.contains(id))
        .collect()
}

// A rewrite that still carries a dropped claim is replaced by the retained
// claims; the uncertainty note is always present.
fn finish_rewrite(text: String, retained: &[String], dropped: &[String]) -> String {
    let normalized = normalize(&text);
    let leaks = dropped
        .iter()
        .map(|d| normalize(d))
        .any(|d| !d.is_empty() && normalized.contains(&d));
    let body = if leaks || normalized.is_empty() {
        warn!("rewrite repeated a dropped claim; using retained claims only");
        retained.join(" ")
    } else {
        text
    };
    if body.contains(UNCERTAINTY_NOTE) {
        body
    } else {
        format!("{}\n\n{}", body.trim_end(), UNCERTAINTY_NOTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaked_rewrite_falls_back_to_retained() {
        let retained = vec!["Refunds take 30 days.".to_string()];
        let dropped = vec!["Refunds are paid in gold.".to_string()];
        let text = finish_rewrite(
            "Refunds take 30 days. REFUNDS are paid in gold".to_string(),
            &retained,
            &dropped,
        );
        assert!(text.starts_with("Refunds take 30 days."));
        assert!(!text.to_lowercase().contains("gold"));
        assert!(text.ends_with(UNCERTAINTY_NOTE));
    }

    #[test]
    fn clean_rewrite_gets_note_once() {
        let text = finish_rewrite(
            format!("Refunds take a month.\n\n{UNCERTAINTY_NOTE}"),
            &["Refunds take 30 days.".to_string()],
            &["Refunds are paid in gold.".to_string()],
        );
        assert_eq!(text.matches(UNCERTAINTY_NOTE).count(), 1);
    }
}
