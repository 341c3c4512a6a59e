use askgate_core::{Chunk, ChunkId, FusionConfig, FusionStrategy, RetrievalCandidate, ScoredChunk};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// The final, ordered context for one request.
///
/// An empty set is a legitimate outcome (nothing relevant was found) and is
/// kept distinct from retrieval errors, which never reach fusion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FusedContext {
    pub candidates: Vec<RetrievalCandidate>,
}

impl FusedContext {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.candidates.iter().map(|c| c.id()).collect()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.candidates.iter().map(|c| &c.chunk)
    }

    pub fn contains(&self, id: &ChunkId) -> bool {
        self.candidates.iter().any(|c| &c.id() == id)
    }

    /// 1-based fused rank of a chunk, if it made the cut.
    pub fn rank_of(&self, id: &ChunkId) -> Option<usize> {
        self.candidates.iter().find(|c| &c.id() == id).map(|c| c.rank)
    }
}

struct Entry {
    chunk: Arc<Chunk>,
    semantic: Option<(usize, f32)>,
    lexical: Option<(usize, f32)>,
}

/// Merge two independently ranked lists into one deterministic top-`final_k`.
///
/// Pure function of its inputs: the same lists and config always give the same
/// order. Ties on fused score fall back to (1) present in both lists,
/// (2) newer document version, (3) chunk id ascending.
///
/// The first `config.list_leaders` hits of each list are kept ahead of any
/// other candidate when the cut is made, so an exact keyword match found by
/// one path alone is not crowded out by chunks both paths returned.
#[instrument(skip(semantic, lexical, config), fields(semantic = semantic.len(), lexical = lexical.len()))]
pub fn fuse(
    semantic: &[ScoredChunk],
    lexical: &[ScoredChunk],
    config: &FusionConfig,
    final_k: usize,
) -> FusedContext {
    let mut merged: BTreeMap<ChunkId, Entry> = BTreeMap::new();

    for (rank, hit) in dedup(semantic).into_iter().enumerate() {
        merged
            .entry(hit.chunk.id)
            .or_insert_with(|| Entry {
                chunk: hit.chunk.clone(),
                semantic: None,
                lexical: None,
            })
            .semantic = Some((rank + 1, hit.score));
    }
    for (rank, hit) in dedup(lexical).into_iter().enumerate() {
        merged
            .entry(hit.chunk.id)
            .or_insert_with(|| Entry {
                chunk: hit.chunk.clone(),
                semantic: None,
                lexical: None,
            })
            .lexical = Some((rank + 1, hit.score));
    }

    let semantic_range = score_range(semantic);
    let lexical_range = score_range(lexical);

    let mut candidates: Vec<RetrievalCandidate> = merged
        .into_values()
        .map(|entry| {
            let fused_score = match config.strategy {
                FusionStrategy::ReciprocalRank => {
                    let k = f64::from(config.rrf_k.max(1));
                    [entry.semantic, entry.lexical]
                        .iter()
                        .flatten()
                        .map(|(rank, _)| 1.0 / (k + *rank as f64))
                        .sum::<f64>()
                }
                FusionStrategy::WeightedSum => {
                    let semantic = entry
                        .semantic
                        .map(|(_, s)| normalize(s, semantic_range))
                        .unwrap_or(0.0);
                    let lexical = entry
                        .lexical
                        .map(|(_, s)| normalize(s, lexical_range))
                        .unwrap_or(0.0);
                    f64::from(config.semantic_weight) * semantic
                        + f64::from(config.lexical_weight) * lexical
                }
            };
            RetrievalCandidate {
                chunk: entry.chunk,
                semantic_score: entry.semantic.map(|(_, s)| s),
                lexical_score: entry.lexical.map(|(_, s)| s),
                semantic_rank: entry.semantic.map(|(r, _)| r),
                lexical_rank: entry.lexical.map(|(r, _)| r),
                fused_score,
                rank: 0,
            }
        })
        .collect();

    candidates.sort_by(compare_candidates);
    let mut candidates = cut(candidates, final_k, config.list_leaders);
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = index + 1;
    }

    debug!("fused context holds {} candidates", candidates.len());
    FusedContext { candidates }
}

fn compare_candidates(a: &RetrievalCandidate, b: &RetrievalCandidate) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| b.in_both_lists().cmp(&a.in_both_lists()))
        .then_with(|| b.chunk.document_version.cmp(&a.chunk.document_version))
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

// Keeps `final_k` of the sorted candidates in sorted order. List leaders are
// taken first but hold at most half of the slots.
fn cut(mut sorted: Vec<RetrievalCandidate>, final_k: usize, leaders: usize) -> Vec<RetrievalCandidate> {
    if sorted.len() <= final_k {
        return sorted;
    }
    let mut pinned = sorted
        .iter()
        .filter(|c| is_leader(c, leaders))
        .count()
        .min(final_k / 2);
    let mut open = final_k - pinned;
    sorted.retain(|c| {
        if is_leader(c, leaders) {
            if pinned == 0 {
                return false;
            }
            pinned -= 1;
            true
        } else if open > 0 {
            open -= 1;
            true
        } else {
            false
        }
    });
    sorted
}

fn is_leader(candidate: &RetrievalCandidate, leaders: usize) -> bool {
    [candidate.semantic_rank, candidate.lexical_rank]
        .iter()
        .flatten()
        .any(|rank| *rank <= leaders)
}

// A chunk repeated inside one list keeps its first (best) position.
fn dedup(hits: &[ScoredChunk]) -> Vec<&ScoredChunk> {
    let mut seen = std::collections::HashSet::with_capacity(hits.len());
    hits.iter().filter(|h| seen.insert(h.chunk.id)).collect()
}

fn score_range(hits: &[ScoredChunk]) -> Option<(f32, f32)> {
    hits.iter()
        .map(|h| h.score)
        .filter(|s| s.is_finite())
        .fold(None, |acc, s| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
        })
}

fn normalize(score: f32, range: Option<(f32, f32)>) -> f64 {
    match range {
        Some((lo, hi)) if score.is_finite() => {
            if hi > lo {
                f64::from((score - lo) / (hi - lo))
            } else {
                1.0
            }
        }
        _ => 0.0,
    }
}
