//! Tokenization shared by lexical search and claim grounding.

const JOINERS: [char; 3] = ['-', '_', '.'];

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "did", "do", "does",
    "for", "from", "had", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "of",
    "on", "or", "our", "so", "such", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "to", "was", "we", "were", "what", "when", "where", "which", "who",
    "why", "will", "with", "you", "your",
];

/// Lowercased terms. Codes such as `XK-4471B` or `v2.1` are kept whole and
/// their parts are emitted as well, so both exact and partial queries hit.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split(|c: char| !(c.is_alphanumeric() || JOINERS.contains(&c))) {
        let word = raw.trim_matches(|c: char| JOINERS.contains(&c));
        if word.is_empty() {
            continue;
        }
        let word = word.to_lowercase();
        if word.contains(JOINERS) {
            let parts: Vec<&str> = word.split(JOINERS).filter(|p| !p.is_empty()).collect();
            tokens.push(word.clone());
            tokens.extend(parts.into_iter().map(str::to_string));
        } else {
            tokens.push(word);
        }
    }
    tokens
}

pub fn is_stopword(term: &str) -> bool {
    STOPWORDS.binary_search(&term).is_ok()
}

/// Tokens minus stopwords, in order of appearance, deduplicated.
pub fn content_terms(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
