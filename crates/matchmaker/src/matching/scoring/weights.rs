use serde::{Deserialize, Serialize};

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Inputs blended into a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Preference,
    SemanticSimilarity,
    Collaborative,
}

impl SignalKind {
    pub const fn label(self) -> &'static str {
        match self {
            SignalKind::Preference => "preference",
            SignalKind::SemanticSimilarity => "semantic",
            SignalKind::Collaborative => "collaborative",
        }
    }

    fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "preference" => Some(Self::Preference),
            "semantic" | "semantic_similarity" => Some(Self::SemanticSimilarity),
            "collaborative" => Some(Self::Collaborative),
            _ => None,
        }
    }
}

/// Named, static set of signal weights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum WeightProfile {
    #[default]
    PreferenceOnly,
    Semantic {
        preference: f64,
        semantic: f64,
    },
    Blended {
        preference: f64,
        semantic: f64,
        collaborative: f64,
    },
}

impl WeightProfile {
    pub const fn semantic() -> Self {
        Self::Semantic {
            preference: 0.6,
            semantic: 0.4,
        }
    }

    pub const fn blended() -> Self {
        Self::Blended {
            preference: 0.5,
            semantic: 0.3,
            collaborative: 0.2,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ScoringConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "preference_only" | "preference" => Ok(Self::PreferenceOnly),
            "semantic" => Ok(Self::semantic()),
            "blended" => Ok(Self::blended()),
            other => Err(ScoringConfigError::UnknownProfile(other.to_string())),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            WeightProfile::PreferenceOnly => "preference_only",
            WeightProfile::Semantic { .. } => "semantic",
            WeightProfile::Blended { .. } => "blended",
        }
    }

    /// Declared weights in signal order.
    pub fn weights(&self) -> Vec<(SignalKind, f64)> {
        match *self {
            WeightProfile::PreferenceOnly => vec![(SignalKind::Preference, 1.0)],
            WeightProfile::Semantic {
                preference,
                semantic,
            } => vec![
                (SignalKind::Preference, preference),
                (SignalKind::SemanticSimilarity, semantic),
            ],
            WeightProfile::Blended {
                preference,
                semantic,
                collaborative,
            } => vec![
                (SignalKind::Preference, preference),
                (SignalKind::SemanticSimilarity, semantic),
                (SignalKind::Collaborative, collaborative),
            ],
        }
    }

    pub fn uses(&self, signal: SignalKind) -> bool {
        self.weights().iter().any(|(kind, _)| *kind == signal)
    }

    /// Replace individual weights from a `name=value,name=value` list.
    pub fn with_overrides(mut self, raw: &str) -> Result<Self, ScoringConfigError> {
        for pair in raw.split(',').filter(|pair| !pair.trim().is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| ScoringConfigError::MalformedOverride(pair.trim().to_string()))?;
            let signal = SignalKind::from_label(name)
                .ok_or_else(|| ScoringConfigError::MalformedOverride(pair.trim().to_string()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| ScoringConfigError::MalformedOverride(pair.trim().to_string()))?;

            let slot = match (&mut self, signal) {
                (WeightProfile::Semantic { preference, .. }, SignalKind::Preference)
                | (WeightProfile::Blended { preference, .. }, SignalKind::Preference) => preference,
                (WeightProfile::Semantic { semantic, .. }, SignalKind::SemanticSimilarity)
                | (WeightProfile::Blended { semantic, .. }, SignalKind::SemanticSimilarity) => {
                    semantic
                }
                (WeightProfile::Blended { collaborative, .. }, SignalKind::Collaborative) => {
                    collaborative
                }
                (profile, signal) => {
                    return Err(ScoringConfigError::SignalNotInProfile {
                        signal: signal.label(),
                        profile: profile.name(),
                    })
                }
            };
            *slot = value;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        let weights = self.weights();
        for (signal, value) in &weights {
            if !value.is_finite() || *value < 0.0 || *value > 1.0 {
                return Err(ScoringConfigError::WeightOutOfRange {
                    signal: signal.label(),
                    value: *value,
                });
            }
        }

        let sum: f64 = weights.iter().map(|(_, value)| value).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ScoringConfigError::WeightSum { sum });
        }

        Ok(())
    }
}

/// Invalid scoring configuration, detected before the engine accepts traffic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("unknown weight profile '{0}'")]
    UnknownProfile(String),
    #[error("weights must sum to 1 (got {sum:.4})")]
    WeightSum { sum: f64 },
    #[error("weight for {signal} must be within [0, 1] (got {value})")]
    WeightOutOfRange { signal: &'static str, value: f64 },
    #[error("malformed weight override '{0}'")]
    MalformedOverride(String),
    #[error("signal '{signal}' is not part of the {profile} profile")]
    SignalNotInProfile {
        signal: &'static str,
        profile: &'static str,
    },
    #[error("embedding dimension must be positive")]
    ZeroEmbeddingDimension,
    #[error("embedder produces {actual}-dimensional vectors, configured for {expected}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },
}
