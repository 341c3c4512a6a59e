//! Prompt templates and fixed user-facing texts.

use askgate_retrieval::FusedContext;

/// Answer returned when the Strategist refuses.
pub const REFUSAL_MESSAGE: &str =
    "The system cannot provide a reliable answer based on the available context.";

/// Answer returned when retrieval found nothing to ground an answer in.
pub const INSUFFICIENT_CONTEXT_MESSAGE: &str =
    "The available documents do not contain enough information to answer this question.";

/// Appended to every rewritten answer.
pub const UNCERTAINTY_NOTE: &str =
    "Note: parts of the original answer could not be verified against the available documents and were omitted.";

pub const DRAFT_SYSTEM: &str = "You answer questions about an internal document collection. \
Use only the numbered context passages you are given. If they do not contain the answer, \
say that you cannot answer reliably based on the available data.";

pub const JUDGE_SYSTEM: &str =
    "You are a strict reviewer. Reply with a single JSON object and nothing else.";

/// Numbered passages, `[n]` matching 1-based fused rank.
pub fn render_context(context: &FusedContext) -> String {
    context
        .candidates
        .iter()
        .map(|c| match &c.chunk.heading {
            Some(heading) => format!("[{}] {}\n{}", c.rank, heading, c.chunk.text),
            None => format!("[{}] {}", c.rank, c.chunk.text),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn draft_prompt(question: &str, context: &FusedContext) -> String {
    format!(
        "CONTEXT:\n{}\n\nQUESTION: {}\n\nAnswer concisely using only the context above.",
        render_context(context),
        question
    )
}

pub fn regeneration_prompt(
    question: &str,
    context: &FusedContext,
    previous: &str,
    reason: &str,
) -> String {
    format!(
        "CONTEXT:\n{}\n\nQUESTION: {}\n\nA previous answer was rejected because it did not \
address the question ({}).\nPREVIOUS ANSWER: {}\n\nAnswer the question directly, using only \
the context above.",
        render_context(context),
        question,
        reason,
        previous
    )
}

pub fn gatekeeper_prompt(question: &str, draft: &str) -> String {
    format!(
        "Decide whether the ANSWER directly addresses the QUESTION and is not evasive.\n\
QUESTION: {question}\nANSWER: {draft}\n\n\
Respond with JSON: {{\"ok\": true|false, \"reason\": \"...\"}}"
    )
}

pub fn auditor_prompt(draft: &str, context: &FusedContext) -> String {
    format!(
        "Split the ANSWER into atomic factual claims. For each claim list the numbers of the \
CONTEXT passages that state it. Use the context only, not general knowledge; a claim no passage \
states gets an empty list.\n\nCONTEXT:\n{}\n\nANSWER:\n{}\n\n\
Respond with JSON: {{\"claims\": [{{\"text\": \"...\", \"evidence\": [1, 2]}}]}}",
        render_context(context),
        draft
    )
}

pub fn rewrite_prompt(
    question: &str,
    retained: &[String],
    dropped: &[String],
    context: &FusedContext,
) -> String {
    let bullet = |items: &[String]| {
        items
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Rewrite an answer to the QUESTION using only the VERIFIED statements. Do not repeat, \
paraphrase or hint at any REMOVED statement. Reply with the answer text only.\n\n\
QUESTION: {}\n\nVERIFIED:\n{}\n\nREMOVED:\n{}\n\nCONTEXT:\n{}",
        question,
        bullet(retained),
        bullet(dropped),
        render_context(context)
    )
}
