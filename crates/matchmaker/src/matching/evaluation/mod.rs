mod rules;

use serde::{Deserialize, Serialize};

use super::domain::{AttributeValue, Attributes, Preferences, RangeBounds};
use rules::Check;

/// Outcome of checking one side's attributes against the other side's preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatisfactionResult {
    pub score: f64,
    pub satisfied: Vec<String>,
    pub violated: Vec<Violation>,
}

impl SatisfactionResult {
    /// Full satisfaction with nothing evaluated.
    pub fn vacuous() -> Self {
        Self {
            score: 1.0,
            satisfied: Vec::new(),
            violated: Vec::new(),
        }
    }

    /// True when no preference key could be evaluated, so the score of 1 carries no signal.
    pub fn is_vacuous(&self) -> bool {
        self.satisfied.is_empty() && self.violated.is_empty()
    }

    pub fn is_violated(&self, key: &str) -> bool {
        self.violated.iter().any(|violation| violation.key == key)
    }

    pub fn is_satisfied(&self, key: &str) -> bool {
        self.satisfied.iter().any(|satisfied| satisfied == key)
    }
}

/// A preference key the observed attribute failed, with the bound it breached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub key: String,
    pub observed: AttributeValue,
    pub breach: Breach,
}

impl Violation {
    pub fn summary(&self) -> String {
        let observed = &self.observed;
        match &self.breach {
            Breach::BelowMin { min } => format!("{}: {observed} < {min}", self.key),
            Breach::AboveMax { max } => format!("{}: {observed} > {max}", self.key),
            Breach::NotNumeric { bounds } => {
                let min = bounds
                    .min
                    .map(|min| min.to_string())
                    .unwrap_or_else(|| "-inf".to_string());
                let max = bounds
                    .max
                    .map(|max| max.to_string())
                    .unwrap_or_else(|| "inf".to_string());
                format!("{}: {observed} is not a number in [{min}, {max}]", self.key)
            }
            Breach::NotInSet { accepted } => {
                let accepted: Vec<String> = accepted.iter().map(ToString::to_string).collect();
                format!(
                    "{}: {observed} not one of [{}]",
                    self.key,
                    accepted.join(", ")
                )
            }
            Breach::Mismatch { expected } => {
                format!("{}: {observed} != {expected}", self.key)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breach {
    BelowMin { min: f64 },
    AboveMax { max: f64 },
    NotNumeric { bounds: RangeBounds },
    NotInSet { accepted: Vec<AttributeValue> },
    Mismatch { expected: AttributeValue },
}

/// Score how well `attributes` satisfy `preferences`.
///
/// Preference keys with no corresponding attribute are skipped: an unknown attribute neither
/// satisfies nor violates. The score is `satisfied / (satisfied + violated)`, or `1` when
/// nothing could be evaluated. Output keys follow the preference map's key order.
pub fn evaluate(attributes: &Attributes, preferences: &Preferences) -> SatisfactionResult {
    if preferences.is_empty() {
        return SatisfactionResult::vacuous();
    }

    let mut satisfied = Vec::new();
    let mut violated = Vec::new();

    for (key, preference) in preferences {
        let Some(observed) = attributes.get(key) else {
            continue;
        };

        match rules::check(observed, preference) {
            Check::Satisfied => satisfied.push(key.clone()),
            Check::Violated(breach) => violated.push(Violation {
                key: key.clone(),
                observed: observed.clone(),
                breach,
            }),
        }
    }

    let evaluated = satisfied.len() + violated.len();
    let score = if evaluated == 0 {
        1.0
    } else {
        satisfied.len() as f64 / evaluated as f64
    };

    SatisfactionResult {
        score,
        satisfied,
        violated,
    }
}
