mod similarity;
mod weights;

pub use similarity::{
    collaborative_signal, cosine_similarity, entity_similarity, similar_peers, SimilarityError,
};
pub use weights::{ScoringConfigError, SignalKind, WeightProfile};

use std::collections::BTreeMap;

use tracing::warn;

use super::domain::{Entity, MatchCandidate, ScoreBreakdown};
use super::evaluation::evaluate;

/// Auxiliary values computed outside the scorer because they need storage reads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AuxiliaryInputs {
    /// Mean prior score between similar peers and the counterpart. `None` reads as no history.
    pub collaborative: Option<f64>,
}

/// Stateless scorer applying one validated weight profile.
#[derive(Debug, Clone)]
pub struct Scorer {
    profile: WeightProfile,
}

impl Scorer {
    pub fn new(profile: WeightProfile) -> Result<Self, ScoringConfigError> {
        profile.validate()?;
        Ok(Self { profile })
    }

    pub fn profile(&self) -> &WeightProfile {
        &self.profile
    }

    pub fn uses(&self, signal: SignalKind) -> bool {
        self.profile.uses(signal)
    }

    /// Score `counterpart` for `arriving`, checking preferences in both directions.
    pub fn score(
        &self,
        arriving: &Entity,
        counterpart: &Entity,
        inputs: AuxiliaryInputs,
    ) -> MatchCandidate {
        let forward = evaluate(&counterpart.attributes, &arriving.preferences);
        let reverse = evaluate(&arriving.attributes, &counterpart.preferences);
        let preference_score = (forward.score + reverse.score) / 2.0;

        let mut auxiliary_signals = BTreeMap::new();
        let mut omitted_signals = Vec::new();
        let mut defined = Vec::new();

        for (signal, weight) in self.profile.weights() {
            let value = match signal {
                SignalKind::Preference => Some(preference_score),
                SignalKind::SemanticSimilarity => match entity_similarity(arriving, counterpart) {
                    Ok(similarity) => Some(similarity),
                    Err(SimilarityError::Missing) => None,
                    Err(err) => {
                        warn!(
                            arriving = %arriving.id,
                            counterpart = %counterpart.id,
                            error = %err,
                            "semantic similarity undefined; omitting signal"
                        );
                        None
                    }
                },
                SignalKind::Collaborative => Some(inputs.collaborative.unwrap_or(0.0)),
            };

            match value {
                Some(value) => {
                    if signal != SignalKind::Preference {
                        auxiliary_signals.insert(signal, value);
                    }
                    defined.push((signal, weight, value));
                }
                None => omitted_signals.push(signal),
            }
        }

        let total_weight: f64 = defined.iter().map(|(_, weight, _)| weight).sum();
        let mut weights = BTreeMap::new();
        let mut final_score = 0.0;
        for (signal, weight, value) in defined {
            let effective = if total_weight > 0.0 {
                weight / total_weight
            } else {
                0.0
            };
            weights.insert(signal, effective);
            final_score += effective * value;
        }

        MatchCandidate {
            counterpart: counterpart.clone(),
            final_score,
            breakdown: ScoreBreakdown {
                profile: self.profile.name().to_string(),
                preference_score,
                auxiliary_signals,
                omitted_signals,
                weights,
            },
            forward,
            reverse,
        }
    }
}
