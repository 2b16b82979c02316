use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evaluation::SatisfactionResult;
use super::scoring::SignalKind;

/// Stable, pool-tagged identifier for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier assigned by the store to a recorded match edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two disjoint pools matched against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolTag {
    A,
    B,
}

impl PoolTag {
    pub const fn opposite(self) -> Self {
        match self {
            PoolTag::A => PoolTag::B,
            PoolTag::B => PoolTag::A,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PoolTag::A => "a",
            PoolTag::B => "b",
        }
    }
}

/// Observable fact about an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Equality used by exact and set preferences. Numbers compare within `f64::EPSILON`.
    pub fn matches(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Number(left), AttributeValue::Number(right)) => {
                (left - right).abs() <= f64::EPSILON
            }
            (left, right) => left == right,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Flag(value) => write!(f, "{value}"),
            AttributeValue::Number(value) => write!(f, "{value}"),
            AttributeValue::Text(value) => write!(f, "\"{value}\""),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Inclusive numeric bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Constraint an entity declares about a counterpart's attribute.
///
/// On the wire a JSON array is a set of acceptable values, an object with `min`/`max` is a
/// closed range, and any scalar is an exact requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Preference {
    OneOf(Vec<AttributeValue>),
    Range(RangeBounds),
    Exact(AttributeValue),
}

impl Preference {
    pub fn at_least(min: f64) -> Self {
        Self::Range(RangeBounds {
            min: Some(min),
            max: None,
        })
    }

    pub fn at_most(max: f64) -> Self {
        Self::Range(RangeBounds {
            min: None,
            max: Some(max),
        })
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self::Range(RangeBounds {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn exactly(value: impl Into<AttributeValue>) -> Self {
        Self::Exact(value.into())
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;
pub type Preferences = BTreeMap<String, Preference>;

/// One member of either pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub pool: PoolTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// Display name, falling back to a rendering of the id.
    pub fn name(&self) -> Cow<'_, str> {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Cow::Borrowed(name),
            _ => Cow::Owned(format!("Entity {}", self.id)),
        }
    }
}

/// Intake payload for a newly arriving entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub pool: PoolTag,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Every component that contributed to a final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub profile: String,
    pub preference_score: f64,
    #[serde(default)]
    pub auxiliary_signals: BTreeMap<SignalKind, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted_signals: Vec<SignalKind>,
    /// Effective weights after omitted signals were dropped and the rest renormalized.
    #[serde(default)]
    pub weights: BTreeMap<SignalKind, f64>,
}

/// Scored pairing that exists only for the duration of one ranking pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub counterpart: Entity,
    pub final_score: f64,
    pub breakdown: ScoreBreakdown,
    /// Counterpart attributes against the arriving entity's preferences.
    pub forward: SatisfactionResult,
    /// Arriving entity attributes against the counterpart's preferences.
    pub reverse: SatisfactionResult,
}

/// Path that wrote an edge. Only online edges feed the collaborative signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    #[default]
    Online,
    Batch,
}

/// Edge contents handed to the store, which assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDraft {
    #[serde(default)]
    pub origin: MatchOrigin,
    pub from_entity_id: EntityId,
    pub to_entity_id: EntityId,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub forward: SatisfactionResult,
    pub reverse: SatisfactionResult,
    pub matched_at: DateTime<Utc>,
}

/// Durable matched edge. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    #[serde(default)]
    pub origin: MatchOrigin,
    pub from_entity_id: EntityId,
    pub to_entity_id: EntityId,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub forward: SatisfactionResult,
    pub reverse: SatisfactionResult,
    pub matched_at: DateTime<Utc>,
}

impl Match {
    pub fn from_draft(id: MatchId, draft: MatchDraft) -> Self {
        let MatchDraft {
            origin,
            from_entity_id,
            to_entity_id,
            score,
            breakdown,
            forward,
            reverse,
            matched_at,
        } = draft;

        Self {
            id,
            origin,
            from_entity_id,
            to_entity_id,
            score,
            breakdown,
            forward,
            reverse,
            matched_at,
        }
    }

    /// True when the edge joins `a` and `b` in either direction.
    pub fn connects(&self, a: &EntityId, b: &EntityId) -> bool {
        (&self.from_entity_id == a && &self.to_entity_id == b)
            || (&self.from_entity_id == b && &self.to_entity_id == a)
    }

    pub fn involves(&self, id: &EntityId) -> bool {
        &self.from_entity_id == id || &self.to_entity_id == id
    }
}

/// Runner-up listed alongside a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub id: EntityId,
    pub name: String,
    pub score: f64,
}

impl From<&MatchCandidate> for RankedEntry {
    fn from(candidate: &MatchCandidate) -> Self {
        Self {
            id: candidate.counterpart.id.clone(),
            name: candidate.counterpart.name().into_owned(),
            score: candidate.final_score,
        }
    }
}

/// Audience-specific announcement, one per side of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub recipient_entity_id: EntityId,
    pub counterpart_entity_id: EntityId,
    pub score: f64,
    pub announcement: String,
    pub other_candidates: Vec<RankedEntry>,
}
