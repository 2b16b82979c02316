use std::cmp::Ordering;
use std::collections::HashMap;

use super::domain::{EntityId, MatchCandidate};

pub const DEFAULT_TOP_K: usize = 5;

/// Order candidates best-first and keep the top `limit`.
///
/// Score descending, then fewer existing matches (so one popular counterpart does not absorb
/// every arrival when scores cluster), then display name, then id. An empty input yields an
/// empty ranking, which callers treat as "no match".
pub fn rank(
    mut candidates: Vec<MatchCandidate>,
    existing_matches: &HashMap<EntityId, u32>,
    limit: usize,
) -> Vec<MatchCandidate> {
    candidates.sort_by(|left, right| compare(left, right, existing_matches));
    candidates.truncate(limit);
    candidates
}

fn compare(
    left: &MatchCandidate,
    right: &MatchCandidate,
    existing_matches: &HashMap<EntityId, u32>,
) -> Ordering {
    let count = |candidate: &MatchCandidate| {
        existing_matches
            .get(&candidate.counterpart.id)
            .copied()
            .unwrap_or(0)
    };

    right
        .final_score
        .total_cmp(&left.final_score)
        .then_with(|| count(left).cmp(&count(right)))
        .then_with(|| left.counterpart.name().cmp(&right.counterpart.name()))
        .then_with(|| left.counterpart.id.cmp(&right.counterpart.id))
}
