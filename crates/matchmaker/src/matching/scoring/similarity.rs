use super::super::domain::{Entity, EntityId};

/// Reasons a cosine similarity is undefined for a pair of vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimilarityError {
    #[error("embedding is missing")]
    Missing,
    #[error("embedding is empty or has zero magnitude")]
    ZeroVector,
    #[error("embedding dimensions differ ({left} vs {right})")]
    DimensionMismatch { left: usize, right: usize },
}

/// `dot(a, b) / (|a| * |b|)`, accumulated in f64.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return Err(SimilarityError::ZeroVector);
    }

    Ok(dot / denom)
}

pub fn entity_similarity(left: &Entity, right: &Entity) -> Result<f64, SimilarityError> {
    match (left.embedding.as_deref(), right.embedding.as_deref()) {
        (Some(a), Some(b)) => cosine_similarity(a, b),
        _ => Err(SimilarityError::Missing),
    }
}

/// Same-pool peers most similar to `entity`, best first, excluding `entity` itself and peers
/// with no defined similarity or a non-positive one.
pub fn similar_peers(entity: &Entity, peers: &[Entity], limit: usize) -> Vec<EntityId> {
    let mut scored: Vec<(f64, &EntityId)> = peers
        .iter()
        .filter(|peer| peer.id != entity.id && peer.pool == entity.pool)
        .filter_map(|peer| {
            entity_similarity(entity, peer)
                .ok()
                .filter(|similarity| *similarity > 0.0)
                .map(|similarity| (similarity, &peer.id))
        })
        .collect();

    scored.sort_by(|left, right| right.0.total_cmp(&left.0).then_with(|| left.1.cmp(right.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, id)| id.clone())
        .collect()
}

/// Mean of prior match scores; `0` with no history.
pub fn collaborative_signal(prior_scores: &[f64]) -> f64 {
    if prior_scores.is_empty() {
        return 0.0;
    }
    prior_scores.iter().sum::<f64>() / prior_scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let similarity = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).expect("defined");
        assert!((similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let similarity = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).expect("defined");
        assert!(similarity.abs() < 1e-9);
    }

    #[test]
    fn zero_and_mismatched_vectors_are_errors() {
        assert_eq!(
            cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]),
            Err(SimilarityError::ZeroVector)
        );
        assert_eq!(cosine_similarity(&[], &[]), Err(SimilarityError::ZeroVector));
        assert_eq!(
            cosine_similarity(&[1.0], &[1.0, 0.0]),
            Err(SimilarityError::DimensionMismatch { left: 1, right: 2 })
        );
    }

    #[test]
    fn collaborative_signal_defaults_to_zero() {
        assert_eq!(collaborative_signal(&[]), 0.0);
        assert!((collaborative_signal(&[0.5, 1.0]) - 0.75).abs() < 1e-9);
    }
}
