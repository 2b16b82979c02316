use std::time::Duration;

use super::ranking::DEFAULT_TOP_K;
use super::scoring::{ScoringConfigError, WeightProfile};

/// Static engine configuration, validated before the engine accepts traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub profile: WeightProfile,
    pub top_k: usize,
    pub topic: String,
    /// Bound applied to every collaborator call.
    pub io_timeout: Duration,
    /// How many same-pool peers feed the collaborative signal.
    pub similar_peers: usize,
    pub embedding_dimension: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            profile: WeightProfile::default(),
            top_k: DEFAULT_TOP_K,
            topic: "matches".to_string(),
            io_timeout: Duration::from_secs(5),
            similar_peers: 5,
            embedding_dimension: 64,
        }
    }
}

impl MatchingConfig {
    pub fn with_profile(mut self, profile: WeightProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        self.profile.validate()?;
        if self.embedding_dimension == 0 {
            return Err(ScoringConfigError::ZeroEmbeddingDimension);
        }
        Ok(())
    }
}
