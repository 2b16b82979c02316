//! Offline recomputation over every cross-pool pair.
//!
//! Unlike the online path, the batch matcher sees already-persisted entities, so every write
//! goes through [`MatchRecorder::record_if_absent`]. Re-running with the same threshold over the
//! same data creates nothing new.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::MatchingConfig;
use super::domain::{Entity, EntityId, MatchCandidate, MatchId, PoolTag};
use super::error::MatchingError;
use super::ranking::rank;
use super::recorder::{MatchRecorder, RecordOutcome};
use super::repository::{bounded, MatchStore};
use super::scoring::{AuxiliaryInputs, Scorer};
use super::signals::collaborative_inputs;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Pairs scoring below this are skipped.
    pub threshold: f64,
    /// Check edges and report, but write nothing.
    pub dry_run: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairAction {
    Created,
    WouldCreate,
    AlreadyMatched,
    BelowThreshold,
}

impl PairAction {
    pub fn label(self) -> &'static str {
        match self {
            PairAction::Created => "created",
            PairAction::WouldCreate => "would_create",
            PairAction::AlreadyMatched => "already_matched",
            PairAction::BelowThreshold => "below_threshold",
        }
    }
}

/// Decision for one pool-A/pool-B pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDecision {
    pub from_entity_id: EntityId,
    pub to_entity_id: EntityId,
    pub score: f64,
    pub action: PairAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<MatchId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub threshold: f64,
    pub dry_run: bool,
    pub pairs_scanned: usize,
    pub created: usize,
    pub would_create: usize,
    pub already_matched: usize,
    pub below_threshold: usize,
    pub decisions: Vec<PairDecision>,
}

impl BatchReport {
    fn new(options: BatchOptions) -> Self {
        Self {
            threshold: options.threshold,
            dry_run: options.dry_run,
            pairs_scanned: 0,
            created: 0,
            would_create: 0,
            already_matched: 0,
            below_threshold: 0,
            decisions: Vec::new(),
        }
    }

    fn push(&mut self, decision: PairDecision) {
        self.pairs_scanned += 1;
        match decision.action {
            PairAction::Created => self.created += 1,
            PairAction::WouldCreate => self.would_create += 1,
            PairAction::AlreadyMatched => self.already_matched += 1,
            PairAction::BelowThreshold => self.below_threshold += 1,
        }
        self.decisions.push(decision);
    }

    pub fn skipped(&self) -> usize {
        self.already_matched + self.below_threshold
    }

    pub fn summary(&self) -> String {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        format!(
            "scanned {} pairs at threshold {:.2}{mode}: {} created, {} would be created, {} already matched, {} below threshold",
            self.pairs_scanned,
            self.threshold,
            self.created,
            self.would_create,
            self.already_matched,
            self.below_threshold,
        )
    }
}

pub struct BatchMatcher<S> {
    store: Arc<S>,
    scorer: Arc<Scorer>,
    recorder: MatchRecorder<S>,
    config: MatchingConfig,
}

impl<S> BatchMatcher<S>
where
    S: MatchStore + 'static,
{
    pub fn new(store: Arc<S>, scorer: Arc<Scorer>, config: MatchingConfig) -> Self {
        let recorder = MatchRecorder::new(store.clone(), config.io_timeout);
        Self {
            store,
            scorer,
            recorder,
            config,
        }
    }

    /// Score every pool-A entity against every pool-B entity and record pairs at or above the
    /// threshold that are not already joined by an edge.
    ///
    /// Pairs are visited per pool-A entity in ranking order. A read failure aborts the run; a
    /// write failure aborts it too, leaving earlier edges in place.
    pub async fn run(&self, options: BatchOptions) -> Result<BatchReport, MatchingError> {
        if !(0.0..=1.0).contains(&options.threshold) {
            return Err(MatchingError::InvalidThreshold(options.threshold));
        }

        let timeout = self.config.io_timeout;
        let (side_a, side_b) = futures::try_join!(
            bounded(timeout, self.store.list_pool(PoolTag::A)),
            bounded(timeout, self.store.list_pool(PoolTag::B)),
        )
        .map_err(MatchingError::StorageRead)?;

        info!(
            pool_a = side_a.len(),
            pool_b = side_b.len(),
            threshold = options.threshold,
            dry_run = options.dry_run,
            "batch matching started"
        );

        let mut report = BatchReport::new(options);
        for entity in &side_a {
            for candidate in self.ranked_pairs(entity, &side_b).await? {
                let decision = self.decide(entity, &candidate, options).await?;
                report.push(decision);
            }
        }

        info!(summary = %report.summary(), "batch matching finished");
        Ok(report)
    }

    async fn ranked_pairs(
        &self,
        entity: &Entity,
        counterparts: &[Entity],
    ) -> Result<Vec<MatchCandidate>, MatchingError> {
        if counterparts.is_empty() {
            return Ok(Vec::new());
        }

        let timeout = self.config.io_timeout;
        let counts: HashMap<EntityId, u32> = bounded(timeout, self.store.match_counts())
            .await
            .map_err(MatchingError::StorageRead)?;
        let collaborative = collaborative_inputs(
            self.store.as_ref(),
            timeout,
            &self.scorer,
            entity,
            counterparts,
            self.config.similar_peers,
        )
        .await
        .map_err(MatchingError::StorageRead)?;

        let scorer = self.scorer.as_ref();
        let candidates: Vec<MatchCandidate> = counterparts
            .par_iter()
            .map(|counterpart| {
                let inputs = AuxiliaryInputs {
                    collaborative: collaborative.get(&counterpart.id).copied(),
                };
                scorer.score(entity, counterpart, inputs)
            })
            .collect();

        Ok(rank(candidates, &counts, counterparts.len()))
    }

    async fn decide(
        &self,
        entity: &Entity,
        candidate: &MatchCandidate,
        options: BatchOptions,
    ) -> Result<PairDecision, MatchingError> {
        let decision = |action, match_id| PairDecision {
            from_entity_id: entity.id.clone(),
            to_entity_id: candidate.counterpart.id.clone(),
            score: candidate.final_score,
            action,
            match_id,
        };

        if candidate.final_score < options.threshold {
            return Ok(decision(PairAction::BelowThreshold, None));
        }

        if options.dry_run {
            return Ok(match self.recorder.existing_edge(entity, candidate).await? {
                Some(existing) => decision(PairAction::AlreadyMatched, Some(existing.id)),
                None => decision(PairAction::WouldCreate, None),
            });
        }

        match self.recorder.record_if_absent(entity, candidate).await {
            Ok(RecordOutcome::Created(record)) => Ok(decision(PairAction::Created, Some(record.id))),
            Ok(RecordOutcome::Existing(existing)) => {
                Ok(decision(PairAction::AlreadyMatched, Some(existing.id)))
            }
            Err(err) => {
                warn!(
                    from = %entity.id,
                    to = %candidate.counterpart.id,
                    error = %err,
                    "batch matching aborted"
                );
                Err(err)
            }
        }
    }
}
