//! Two-pool matchmaking: bidirectional preference scoring, fair ranking, durable match edges,
//! and dual notification fan-out.
//!
//! The online path runs once per arrival through [`MatchmakingService::register`]. The offline
//! path in [`batch`] re-scores every cross-pool pair and skips pairs already joined by an edge.

pub mod batch;
pub mod config;
pub mod domain;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod memory;
pub mod notify;
pub mod ranking;
pub mod recorder;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
mod signals;

#[cfg(test)]
mod tests;

pub use batch::{BatchMatcher, BatchOptions, BatchReport, PairAction, PairDecision};
pub use config::MatchingConfig;
pub use domain::{
    AttributeValue, Attributes, Entity, EntityId, Match, MatchCandidate, MatchId, MatchOrigin,
    NewEntity, NotificationPayload, PoolTag, Preference, Preferences, RangeBounds, RankedEntry,
    ScoreBreakdown,
};
pub use embedding::{Embedder, EmbeddingError, HashingEmbedder};
pub use error::{IntakeError, MatchingError};
pub use evaluation::{evaluate, Breach, SatisfactionResult, Violation};
pub use memory::{InMemoryMatchStore, StoreSnapshot};
pub use notify::{
    Announcer, BroadcastChannel, LocalBroadcast, MatchEvent, NotificationFanout,
    NotificationOutcome, TemplateAnnouncer,
};
pub use ranking::rank;
pub use recorder::{MatchRecorder, RecordOutcome};
pub use repository::{MatchStore, StorageError};
pub use router::matching_router;
pub use scoring::{Scorer, ScoringConfigError, SignalKind, WeightProfile};
pub use service::{MatchOutcome, MatchReport, MatchmakingService};
