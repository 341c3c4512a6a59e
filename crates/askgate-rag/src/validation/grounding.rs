//! Pipeline-side grounding: the only place a claim can become "supported".

use askgate_core::{Chunk, ChunkId};
use askgate_retrieval::{content_terms, is_stopword, tokenize, FusedContext};

const NEGATIONS: &[&str] = &[
    "neither", "never", "no", "nobody", "none", "nor", "not", "nothing", "nowhere", "without",
];

/// Tokens with contractions spelled out, so "can't" and "cannot" both read
/// as `can not`.
pub fn grounding_tokens(text: &str) -> Vec<String> {
    let expanded = text
        .to_lowercase()
        .replace('\u{2019}', "'")
        .replace("can't", "can not")
        .replace("won't", "will not")
        .replace("cannot", "can not")
        .replace("n't", " not");
    tokenize(&expanded)
}

pub fn is_negation(token: &str) -> bool {
    NEGATIONS.binary_search(&token).is_ok()
}

pub fn has_content(claim: &str) -> bool {
    !content_terms(claim).is_empty()
}

/// Sentence split on `.`, `!` or `?` followed by whitespace or end of text,
/// so `v2.1` and `3.5%` stay inside their sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        current.push(ch);
        let at_boundary = matches!(ch, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary || ch == '\n' {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Lowercase, single-spaced, without trailing punctuation.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

// Content terms in order of appearance, first occurrence only.
fn ordered_terms(tokens: &[String]) -> Vec<&str> {
    let mut terms: Vec<&str> = Vec::new();
    for token in tokens {
        if !is_stopword(token) && !terms.contains(&token.as_str()) {
            terms.push(token);
        }
    }
    terms
}

fn is_figure(term: &str) -> bool {
    term.chars().any(|c| c.is_ascii_digit())
}

/// Verifies judge-proposed evidence against the retrieved context.
///
/// A chunk grounds a claim when one of its sentences contains the claim's
/// content terms in the same order, every figure in the claim, and the same
/// number of negations over the matched span (plus the word just before it).
/// `min_coverage` below 1.0 tolerates missing non-figure terms, never
/// reordered ones.
#[derive(Debug, Clone, Copy)]
pub struct GroundingCheck {
    min_coverage: f64,
}

impl GroundingCheck {
    pub fn new(min_coverage: f64) -> Self {
        Self { min_coverage }
    }

    pub fn grounds(&self, claim: &str, chunk: &Chunk) -> bool {
        let claim_tokens = grounding_tokens(claim);
        let terms = ordered_terms(&claim_tokens);
        if terms.is_empty() {
            return false;
        }
        let negations = claim_tokens.iter().filter(|t| is_negation(t)).count();
        split_sentences(&chunk.text)
            .iter()
            .any(|sentence| self.grounds_in(&terms, negations, &grounding_tokens(sentence)))
    }

    fn grounds_in(&self, terms: &[&str], negations: usize, sentence: &[String]) -> bool {
        let mut cursor = 0;
        let mut span: Option<(usize, usize)> = None;
        let mut found = 0usize;
        for term in terms {
            match sentence[cursor..].iter().position(|t| t == term) {
                Some(offset) => {
                    let at = cursor + offset;
                    span = Some(span.map_or((at, at), |(first, _)| (first, at)));
                    cursor = at + 1;
                    found += 1;
                }
                // present, but only before an earlier term
                None if sentence.iter().any(|t| t == term) => return false,
                None if is_figure(term) || is_negation(term) => return false,
                None => {}
            }
        }
        let Some((first, last)) = span else {
            return false;
        };
        if (found as f64) < self.min_coverage * terms.len() as f64 {
            return false;
        }
        let span_negations = sentence[first.saturating_sub(1)..=last]
            .iter()
            .filter(|t| is_negation(t))
            .count();
        span_negations == negations
    }

    /// Evidence chunks that really ground `claim`, in fused-rank order.
    ///
    /// Proposed ids outside the context, or whose text does not cover the
    /// claim, are dropped. With no proposal at all every context chunk is tried.
    pub fn verify(&self, claim: &str, proposed: &[ChunkId], context: &FusedContext) -> Vec<ChunkId> {
        context
            .candidates
            .iter()
            .filter(|c| proposed.is_empty() || proposed.contains(&c.id()))
            .filter(|c| self.grounds(claim, &c.chunk))
            .map(|c| c.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askgate_core::{Document, FusionConfig, ScoredChunk};
    use askgate_retrieval::fuse;
    use std::sync::Arc;
    use uuid::Uuid;

    fn context(texts: &[&str]) -> FusedContext {
        let doc = Document::new("file:///handbook.md");
        let hits: Vec<ScoredChunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let chunk = Chunk::new(&doc, i as u32, *t).with_id(Uuid::from_u128(i as u128 + 1));
                ScoredChunk::new(Arc::new(chunk), 1.0 - i as f32 * 0.1)
            })
            .collect();
        fuse(&hits, &[], &FusionConfig::default(), 10)
    }

    #[test]
    fn every_term_and_figure_must_appear() {
        let ctx = context(&["Refunds are accepted within 30 days of purchase."]);
        let chunk = &ctx.candidates[0].chunk;
        let check = GroundingCheck::new(1.0);
        assert!(check.grounds("Refunds are accepted within 30 days.", chunk));
        assert!(!check.grounds("Refunds are accepted within 90 days.", chunk));
        assert!(!check.grounds("Refunds are accepted within 30 business days.", chunk));
        assert!(!check.grounds("It is.", chunk));
    }

    #[test]
    fn partial_coverage_still_requires_figures() {
        let ctx = context(&["Refunds are accepted within 30 days of purchase."]);
        let chunk = &ctx.candidates[0].chunk;
        let check = GroundingCheck::new(0.8);
        // 4 of 5 terms match, the missing one is the number
        assert!(!check.grounds("Refunds are accepted within 90 days.", chunk));
        assert!(check.grounds("Refunds are quickly accepted within 30 days of purchase.", chunk));
    }

    #[test]
    fn negation_must_match_the_source() {
        let ctx = context(&[
            "Customers may request a refund within 30 days of purchase at any store.",
            "Gift cards are not refundable.",
        ]);
        let (allowed, excluded) = (&ctx.candidates[0].chunk, &ctx.candidates[1].chunk);
        for min in [1.0, 0.8] {
            let check = GroundingCheck::new(min);
            assert!(!check.grounds(
                "Customers may not request a refund within 30 days of purchase at any store.",
                allowed
            ));
            assert!(!check.grounds("Customers can't request a refund within 30 days.", allowed));
            assert!(!check.grounds("Gift cards are refundable.", excluded));
        }
        let check = GroundingCheck::new(1.0);
        assert!(check.grounds("Gift cards aren't refundable.", excluded));
        assert!(check.grounds("Gift cards are not refundable.", excluded));
    }

    #[test]
    fn swapped_terms_are_not_grounded() {
        let ctx = context(&["Refunds are accepted within 30 days of purchase."]);
        let chunk = &ctx.candidates[0].chunk;
        let check = GroundingCheck::new(1.0);
        assert!(!check.grounds("Purchases are accepted within 30 days of refund.", chunk));
        assert!(!check.grounds("Purchase within 30 days of refunds.", chunk));
    }

    #[test]
    fn claim_must_sit_inside_one_sentence() {
        let ctx = context(&["Parking is free. Staff start at 9am."]);
        let chunk = &ctx.candidates[0].chunk;
        let check = GroundingCheck::new(1.0);
        assert!(check.grounds("Staff start at 9am.", chunk));
        assert!(!check.grounds("Parking is free for staff.", chunk));
    }

    #[test]
    fn sentences_keep_versions_and_decimals() {
        assert_eq!(
            split_sentences("Use v2.1 for 3.5% growth. It ships today!  Really?"),
            vec!["Use v2.1 for 3.5% growth.", "It ships today!", "Really?"]
        );
        assert_eq!(normalize("  The Office   opens at 9am. "), "the office opens at 9am");
    }

    #[test]
    fn judge_evidence_cannot_add_support() {
        let ctx = context(&["The office opens at 9am.", "Parking is free for staff."]);
        let check = GroundingCheck::new(1.0);
        let wrong = ctx.candidates[0].id();
        assert!(check
            .verify("Parking is free for staff.", &[wrong], &ctx)
            .is_empty());
        // ids outside the context are ignored
        assert!(check
            .verify("The office opens at 9am.", &[Uuid::from_u128(99)], &ctx)
            .is_empty());
    }

    #[test]
    fn empty_proposal_scans_whole_context() {
        let ctx = context(&["The office opens at 9am.", "Parking is free for staff."]);
        let check = GroundingCheck::new(1.0);
        assert_eq!(
            check.verify("Parking is free for staff", &[], &ctx),
            vec![ctx.candidates[1].id()]
        );
    }
}
