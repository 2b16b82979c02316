use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{Entity, Match, MatchCandidate, MatchDraft, MatchOrigin};
use super::error::MatchingError;
use super::repository::{bounded, MatchStore, StorageError};

/// Result of a duplicate-checked write.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Created(Match),
    Existing(Match),
}

/// Persists winning pairs as directed edges carrying the full score breakdown.
pub struct MatchRecorder<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> MatchRecorder<S>
where
    S: MatchStore + 'static,
{
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Write the edge `from -> candidate.counterpart` without an existence check.
    ///
    /// Only valid for a freshly created `from`, which cannot already have an edge. Failures are
    /// returned as-is and never retried, since a blind retry could duplicate the edge.
    pub async fn record(
        &self,
        from: &Entity,
        candidate: &MatchCandidate,
    ) -> Result<Match, StorageError> {
        self.write(from, candidate, MatchOrigin::Online).await
    }

    /// Write the edge unless one already joins the same unordered pair.
    ///
    /// Edges written here are tagged [`MatchOrigin::Batch`], so later runs never score against
    /// their own output.
    pub async fn record_if_absent(
        &self,
        from: &Entity,
        candidate: &MatchCandidate,
    ) -> Result<RecordOutcome, MatchingError> {
        let existing = self.existing_edge(from, candidate).await?;

        if let Some(existing) = existing {
            debug!(
                match_id = %existing.id,
                from = %from.id,
                to = %candidate.counterpart.id,
                "edge already present; skipping"
            );
            return Ok(RecordOutcome::Existing(existing));
        }

        self.write(from, candidate, MatchOrigin::Batch)
            .await
            .map(RecordOutcome::Created)
            .map_err(MatchingError::StorageWrite)
    }

    pub async fn existing_edge(
        &self,
        from: &Entity,
        candidate: &MatchCandidate,
    ) -> Result<Option<Match>, MatchingError> {
        bounded(
            self.timeout,
            self.store.find_edge(&from.id, &candidate.counterpart.id),
        )
        .await
        .map_err(MatchingError::StorageRead)
    }

    async fn write(
        &self,
        from: &Entity,
        candidate: &MatchCandidate,
        origin: MatchOrigin,
    ) -> Result<Match, StorageError> {
        let draft = MatchDraft {
            origin,
            from_entity_id: from.id.clone(),
            to_entity_id: candidate.counterpart.id.clone(),
            score: candidate.final_score,
            breakdown: candidate.breakdown.clone(),
            forward: candidate.forward.clone(),
            reverse: candidate.reverse.clone(),
            matched_at: Utc::now(),
        };

        let record = bounded(self.timeout, self.store.create_edge(draft)).await?;
        info!(
            match_id = %record.id,
            from = %record.from_entity_id,
            to = %record.to_entity_id,
            score = record.score,
            origin = ?record.origin,
            "match recorded"
        );
        Ok(record)
    }
}
