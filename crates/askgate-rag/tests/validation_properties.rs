use askgate_ai::{GenerationConfig, MockLLMProvider, RetryPolicy};
use askgate_core::{Chunk, Document, FusionConfig, RiskProfile, ScoredChunk, ValidationSettings};
use askgate_rag::{
    DraftGenerator, GateVerdict, MockJudge, ProposedClaim, StrategistDecision, ValidationPipeline,
};
use askgate_retrieval::{fuse, FusedContext};
use std::collections::HashMap;
use std::sync::Arc;

const CORPUS_WORDS: &[&str] = &[
    "pump", "valve", "filter", "gasket", "rotor", "seal", "motor", "bearing", "housing",
    "impeller", "shaft", "coupling", "flange", "nozzle", "sensor", "cable",
];
const FOREIGN_WORDS: &[&str] = &[
    "zebra", "violin", "nebula", "pirate", "tulip", "glacier", "saxophone", "meteor",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ClaimKind {
    Lifted,
    Negated,
    NegationDropped,
    Swapped,
    FigureChanged,
    Foreign,
}

fn sentence(rng: &mut fastrand::Rng, words: &[&str], n: usize) -> String {
    let picked: Vec<&str> = (0..n).map(|_| words[rng.usize(..words.len())]).collect();
    format!("{}.", picked.join(" "))
}

fn words_of(text: &str) -> Vec<String> {
    text.trim_end_matches('.')
        .split(' ')
        .map(str::to_string)
        .collect()
}

/// Seven distinct corpus words, sometimes with a figure and a "not" mixed in.
fn chunk_words(rng: &mut fastrand::Rng) -> Vec<String> {
    let mut pool: Vec<&str> = CORPUS_WORDS.to_vec();
    rng.shuffle(&mut pool);
    let mut words: Vec<String> = pool[..7].iter().map(|w| w.to_string()).collect();
    if rng.bool() {
        let at = rng.usize(..=words.len());
        words.insert(at, rng.u32(10..98).to_string());
    }
    if rng.bool() {
        let at = rng.usize(..=words.len());
        words.insert(at, "not".to_string());
    }
    words
}

fn random_context(rng: &mut fastrand::Rng) -> FusedContext {
    let doc = Document::new("file:///manual.md");
    let hits: Vec<ScoredChunk> = (0..rng.usize(1..6))
        .map(|i| {
            let text = format!("{}.", chunk_words(rng).join(" "));
            let chunk = Chunk::new(&doc, i as u32, text);
            ScoredChunk::new(Arc::new(chunk), 1.0 - i as f32 * 0.1)
        })
        .collect();
    fuse(&hits, &[], &FusionConfig::default(), 10)
}

/// Word-level containment: claim words occur in the chunk in the same order,
/// and the chunk span they cover (plus the word before it) holds as many
/// "not"s as the claim.
fn contained(claim: &[String], chunk: &[String]) -> bool {
    let mut positions = Vec::with_capacity(claim.len());
    for word in claim {
        match chunk.iter().position(|w| w == word) {
            Some(at) => positions.push(at),
            None => return false,
        }
    }
    if positions.is_empty() || positions.windows(2).any(|w| w[0] >= w[1]) {
        return false;
    }
    let first = positions[0].saturating_sub(1);
    let last = positions[positions.len() - 1];
    let nots = |words: &[String]| words.iter().filter(|w| *w == "not").count();
    nots(&chunk[first..=last]) == nots(claim)
}

fn claim_of_kind(rng: &mut fastrand::Rng, context: &FusedContext, kind: ClaimKind) -> Option<String> {
    if kind == ClaimKind::Foreign {
        return Some(sentence(rng, FOREIGN_WORDS, 4));
    }
    let words = words_of(&context.candidates[rng.usize(..context.len())].chunk.text);
    let start = rng.usize(..=words.len() - 4);
    let mut window: Vec<String> = words[start..start + 4].to_vec();
    match kind {
        ClaimKind::Lifted => {}
        ClaimKind::Negated => {
            if window.iter().any(|w| w == "not") {
                return None;
            }
            window.insert(1, "not".to_string());
        }
        ClaimKind::NegationDropped => {
            let at = window.iter().position(|w| w == "not")?;
            window.remove(at);
            if window.is_empty() {
                return None;
            }
        }
        ClaimKind::Swapped => {
            let at = rng.usize(..window.len() - 1);
            window.swap(at, at + 1);
        }
        ClaimKind::FigureChanged => {
            let at = window.iter().position(|w| w.parse::<u32>().is_ok())?;
            let figure: u32 = window[at].parse().ok()?;
            window[at] = (figure + 1).to_string();
        }
        ClaimKind::Foreign => unreachable!(),
    }
    Some(format!("{}.", window.join(" ")))
}

fn pipeline(judge: MockJudge) -> (ValidationPipeline, DraftGenerator) {
    let generator = DraftGenerator::new(
        Arc::new(MockLLMProvider::new("regenerated")),
        GenerationConfig::default(),
        RetryPolicy::no_delay(1),
    );
    let pipeline = ValidationPipeline::new(
        Arc::new(judge),
        ValidationSettings::default(),
        RetryPolicy::no_delay(1),
    );
    (pipeline, generator)
}

/// Claims the judge proposes with every context chunk as evidence, so any
/// support in the report has to come from the grounding check itself.
#[tokio::test]
async fn auditor_supports_exactly_the_claims_contained_in_context() {
    use ClaimKind::*;
    const KINDS: [ClaimKind; 6] = [Lifted, Negated, NegationDropped, Swapped, FigureChanged, Foreign];

    let mut rng = fastrand::Rng::with_seed(0xa0d1);
    let mut rejected: HashMap<ClaimKind, usize> = HashMap::new();
    for round in 0..300 {
        let context = random_context(&mut rng);
        let everything = context.chunk_ids();
        let chunk_words: HashMap<_, _> = context
            .candidates
            .iter()
            .map(|c| (c.id(), words_of(&c.chunk.text)))
            .collect();

        let mut kinds: HashMap<String, ClaimKind> = HashMap::new();
        let mut proposed = Vec::new();
        for _ in 0..rng.usize(1..6) {
            let kind = KINDS[rng.usize(..KINDS.len())];
            let Some(text) = claim_of_kind(&mut rng, &context, kind) else {
                continue;
            };
            kinds.entry(text.clone()).or_insert(kind);
            proposed.push(ProposedClaim::new(text, everything.clone()));
        }
        if proposed.is_empty() {
            continue;
        }
        let draft = proposed
            .iter()
            .map(|c| c.text.clone())
            .collect::<Vec<_>>()
            .join(" ");

        let judge = MockJudge::default()
            .with_verdicts(vec![GateVerdict::pass("scripted")])
            .with_claims(proposed);
        let (pipeline, generator) = pipeline(judge);
        let validated = pipeline
            .validate("pump question", draft, &context, RiskProfile::Strict, &generator)
            .await
            .unwrap();

        for claim in &validated.report.claims {
            let words = words_of(&claim.text);
            let in_context = chunk_words.values().any(|chunk| contained(&words, chunk));
            assert_eq!(claim.supported, in_context, "round {round}: {}", claim.text);

            if claim.supported {
                for id in &claim.evidence {
                    let chunk = chunk_words.get(id).expect("evidence outside context");
                    assert!(contained(&words, chunk), "round {round}: {}", claim.text);
                }
            } else {
                assert!(claim.evidence.is_empty());
                *rejected.entry(kinds[&claim.text]).or_default() += 1;
            }
            if kinds[&claim.text] == Foreign {
                assert!(!claim.supported);
            }
        }

        let report = &validated.report;
        if report.unsupported_count > 0 {
            assert_ne!(report.decision, StrategistDecision::Approve, "round {round}");
        }
        for id in &validated.citations {
            assert!(context.contains(id));
        }
    }

    for kind in [Negated, NegationDropped, Swapped, FigureChanged, Foreign] {
        assert!(rejected.get(&kind).copied().unwrap_or(0) > 0, "{kind:?} never rejected");
    }
}

#[tokio::test]
async fn lifted_claims_without_a_leading_negation_are_supported() {
    let mut rng = fastrand::Rng::with_seed(0x11f7);
    for _ in 0..100 {
        let context = random_context(&mut rng);
        let chunk = &context.candidates[0].chunk;
        let words = words_of(&chunk.text);
        let start = rng.usize(..=words.len() - 4);
        if start > 0 && words[start - 1] == "not" {
            continue;
        }
        let claim = format!("{}.", words[start..start + 4].join(" "));

        let judge = MockJudge::default()
            .with_verdicts(vec![GateVerdict::pass("scripted")])
            .with_claims(vec![ProposedClaim::new(claim.clone(), vec![chunk.id])]);
        let (pipeline, generator) = pipeline(judge);
        let validated = pipeline
            .validate("pump question", claim.clone(), &context, RiskProfile::Strict, &generator)
            .await
            .unwrap();
        assert_eq!(validated.report.decision, StrategistDecision::Approve, "{claim}");
        assert!(validated.citations.contains(&chunk.id));
    }
}

#[tokio::test]
async fn contradicting_claims_are_never_approved_under_strict() {
    let doc = Document::new("file:///policies/returns.md");
    let chunk = Chunk::new(
        &doc,
        0,
        "Customers may request a refund within 30 days of purchase at any store.",
    );
    let context = fuse(
        &[ScoredChunk::new(Arc::new(chunk), 0.9)],
        &[],
        &FusionConfig::default(),
        5,
    );
    for draft in [
        "Customers may not request a refund within 30 days of purchase at any store.",
        "Customers can't request a refund within 30 days of purchase.",
        "Customers may request a purchase within 30 days of refund at any store.",
        "Customers may request a refund within 60 days of purchase at any store.",
    ] {
        let (pipeline, generator) = pipeline(MockJudge::default());
        let validated = pipeline
            .validate("Can customers request a refund?", draft.to_string(), &context, RiskProfile::Strict, &generator)
            .await
            .unwrap();
        assert_ne!(validated.report.decision, StrategistDecision::Approve, "{draft}");
        assert_eq!(validated.report.unsupported_count, 1, "{draft}");
        assert!(!validated.answer.contains(draft));
    }
}

#[tokio::test]
async fn strict_never_approves_after_gatekeeper_failure() {
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..50 {
        let context = random_context(&mut rng);
        let draft = context.candidates[0].chunk.text.clone();
        let judge = MockJudge::default().with_verdicts(vec![
            GateVerdict::fail("off topic"),
            GateVerdict::fail("off topic again"),
        ]);
        let (pipeline, generator) = pipeline(judge);
        let validated = pipeline
            .validate("pump question", draft, &context, RiskProfile::Strict, &generator)
            .await
            .unwrap();
        assert_eq!(validated.report.decision, StrategistDecision::Refuse);
        assert!(validated.citations.is_empty());
    }
}
