use super::grounding::{has_content, split_sentences, GroundingCheck};
use super::judge::{GateVerdict, Judge, ProposedClaim};
use askgate_ai::{ProviderError, ProviderResult};
use askgate_retrieval::{content_terms, FusedContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

const NON_ANSWERS: &[&str] = &[
    "cannot answer",
    "can't answer",
    "unable to answer",
    "i don't know",
    "i do not know",
    "no information",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeCall {
    Gatekeep,
    Audit,
    Rewrite,
}

#[derive(Default)]
struct Scripts {
    verdicts: VecDeque<GateVerdict>,
    claims: VecDeque<Vec<ProposedClaim>>,
    rewrites: VecDeque<String>,
    faults: Vec<(JudgeCall, ProviderError)>,
}

/// Deterministic judge with no model behind it.
///
/// Without scripts: the gatekeeper passes when the draft shares a content term
/// with the question and is not a non-answer, claims are the draft's
/// sentences, evidence is every chunk that grounds a sentence, and a rewrite
/// joins the retained claims. Scripts and faults are consumed first, in order.
pub struct MockJudge {
    grounding: GroundingCheck,
    scripts: Mutex<Scripts>,
    gatekeep_calls: AtomicUsize,
    audit_calls: AtomicUsize,
    rewrite_calls: AtomicUsize,
}

impl Default for MockJudge {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl MockJudge {
    pub fn new(min_coverage: f64) -> Self {
        Self {
            grounding: GroundingCheck::new(min_coverage),
            scripts: Mutex::new(Scripts::default()),
            gatekeep_calls: AtomicUsize::new(0),
            audit_calls: AtomicUsize::new(0),
            rewrite_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_verdicts(self, verdicts: Vec<GateVerdict>) -> Self {
        self.scripts.lock().verdicts.extend(verdicts);
        self
    }

    pub fn with_claims(self, claims: Vec<ProposedClaim>) -> Self {
        self.scripts.lock().claims.push_back(claims);
        self
    }

    pub fn with_rewrite(self, text: impl Into<String>) -> Self {
        self.scripts.lock().rewrites.push_back(text.into());
        self
    }

    /// Fail the next `times` calls of `call` with `error`.
    pub fn with_fault(self, call: JudgeCall, error: ProviderError, times: usize) -> Self {
        {
            let mut scripts = self.scripts.lock();
            for _ in 0..times {
                scripts.faults.push((call, error.clone()));
            }
        }
        self
    }

    pub fn calls(&self, call: JudgeCall) -> usize {
        let counter = match call {
            JudgeCall::Gatekeep => &self.gatekeep_calls,
            JudgeCall::Audit => &self.audit_calls,
            JudgeCall::Rewrite => &self.rewrite_calls,
        };
        counter.load(Ordering::SeqCst)
    }

    fn take_fault(&self, call: JudgeCall) -> ProviderResult<()> {
        let mut scripts = self.scripts.lock();
        match scripts.faults.iter().position(|(c, _)| *c == call) {
            Some(index) => Err(scripts.faults.remove(index).1),
            None => Ok(()),
        }
    }

    fn heuristic_verdict(question: &str, draft: &str) -> GateVerdict {
        let lowered = draft.to_lowercase();
        if let Some(marker) = NON_ANSWERS.iter().find(|m| lowered.contains(*m)) {
            return GateVerdict::fail(format!("draft declines to answer (\"{marker}\")"));
        }
        let asked: HashSet<String> = content_terms(question).into_iter().collect();
        if content_terms(draft).iter().any(|t| asked.contains(t)) {
            GateVerdict::pass("draft addresses the question terms")
        } else {
            GateVerdict::fail("draft does not address the question")
        }
    }
}

#[async_trait]
impl Judge for MockJudge {
    async fn gatekeep(&self, question: &str, draft: &str) -> ProviderResult<GateVerdict> {
        self.gatekeep_calls.fetch_add(1, Ordering::SeqCst);
        self.take_fault(JudgeCall::Gatekeep)?;
        let scripted = self.scripts.lock().verdicts.pop_front();
        Ok(scripted.unwrap_or_else(|| Self::heuristic_verdict(question, draft)))
    }

    async fn audit(&self, draft: &str, context: &FusedContext) -> ProviderResult<Vec<ProposedClaim>> {
        self.audit_calls.fetch_add(1, Ordering::SeqCst);
        self.take_fault(JudgeCall::Audit)?;
        if let Some(scripted) = self.scripts.lock().claims.pop_front() {
            return Ok(scripted);
        }
        Ok(split_sentences(draft)
            .into_iter()
            .filter(|s| has_content(s))
            .map(|sentence| {
                let evidence = self.grounding.verify(&sentence, &[], context);
                ProposedClaim::new(sentence, evidence)
            })
            .collect())
    }

    async fn rewrite(
        &self,
        _question: &str,
        retained: &[String],
        _dropped: &[String],
        _context: &FusedContext,
    ) -> ProviderResult<String> {
        self.rewrite_calls.fetch_add(1, Ordering::SeqCst);
        self.take_fault(JudgeCall::Rewrite)?;
        let scripted = self.scripts.lock().rewrites.pop_front();
        Ok(scripted.unwrap_or_else(|| retained.join(" ")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
