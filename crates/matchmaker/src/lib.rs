//! Two-pool matchmaking engine.
//!
//! Entities from pool A and pool B declare attributes and preferences about each other. The
//! [`matching`] module scores every opposite-pool counterpart in both directions, blends in
//! auxiliary similarity signals, ranks the result fairly, records the winning pair as a durable
//! edge, and broadcasts one announcement addressed to both sides.

pub mod config;
pub mod error;
pub mod matching;
pub mod telemetry;
