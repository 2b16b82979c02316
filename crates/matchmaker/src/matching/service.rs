use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::batch::BatchMatcher;
use super::config::MatchingConfig;
use super::domain::{Entity, EntityId, Match, MatchCandidate, NewEntity, RankedEntry};
use super::embedding::{Embedder, EmbeddingError, HashingEmbedder};
use super::error::{IntakeError, MatchingError};
use super::notify::{
    Announcer, BroadcastChannel, NotificationFanout, NotificationOutcome, TemplateAnnouncer,
};
use super::ranking::rank;
use super::recorder::MatchRecorder;
use super::repository::{bounded, MatchStore};
use super::scoring::{AuxiliaryInputs, Scorer, ScoringConfigError};
use super::signals::collaborative_inputs;

/// Result of one arrival.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub entity: Entity,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
}

/// "No match" is a successful outcome, distinct from every error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched {
        record: Match,
        ranked: Vec<RankedEntry>,
        notification: NotificationOutcome,
    },
    NoMatch,
}

impl MatchReport {
    pub fn record(&self) -> Option<&Match> {
        match &self.outcome {
            MatchOutcome::Matched { record, .. } => Some(record),
            MatchOutcome::NoMatch => None,
        }
    }

    pub fn notification(&self) -> Option<&NotificationOutcome> {
        match &self.outcome {
            MatchOutcome::Matched { notification, .. } => Some(notification),
            MatchOutcome::NoMatch => None,
        }
    }
}

/// Service composing the scorer, ranker, recorder, and notification fan-out.
pub struct MatchmakingService<S, C> {
    store: Arc<S>,
    scorer: Arc<Scorer>,
    recorder: MatchRecorder<S>,
    fanout: NotificationFanout<C>,
    embedder: Arc<dyn Embedder>,
    config: MatchingConfig,
}

impl<S, C> MatchmakingService<S, C>
where
    S: MatchStore + 'static,
    C: BroadcastChannel + 'static,
{
    /// Service with the template announcer and the local hashing embedder.
    pub fn new(
        store: Arc<S>,
        channel: Arc<C>,
        config: MatchingConfig,
    ) -> Result<Self, ScoringConfigError> {
        let embedder = Arc::new(HashingEmbedder::new(config.embedding_dimension));
        Self::with_collaborators(store, channel, Arc::new(TemplateAnnouncer), embedder, config)
    }

    pub fn with_collaborators(
        store: Arc<S>,
        channel: Arc<C>,
        announcer: Arc<dyn Announcer>,
        embedder: Arc<dyn Embedder>,
        config: MatchingConfig,
    ) -> Result<Self, ScoringConfigError> {
        config.validate()?;
        if embedder.dimension() != config.embedding_dimension {
            return Err(ScoringConfigError::EmbeddingDimensionMismatch {
                expected: config.embedding_dimension,
                actual: embedder.dimension(),
            });
        }

        let scorer = Arc::new(Scorer::new(config.profile.clone())?);
        let recorder = MatchRecorder::new(store.clone(), config.io_timeout);
        let fanout =
            NotificationFanout::new(channel, announcer, config.topic.clone(), config.io_timeout);

        Ok(Self {
            store,
            scorer,
            recorder,
            fanout,
            embedder,
            config,
        })
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Admit a new entity and run the online match for it.
    pub async fn register(&self, submission: NewEntity) -> Result<MatchReport, MatchingError> {
        let entity = self.admit(submission).await?;
        self.match_entity(&entity).await
    }

    /// Validate, embed once, and store a new entity.
    pub async fn admit(&self, submission: NewEntity) -> Result<Entity, MatchingError> {
        let NewEntity {
            id,
            pool,
            display_name,
            attributes,
            preferences,
            description,
            embedding,
        } = submission;

        let id = match id {
            Some(id) if id.0.trim().is_empty() => return Err(IntakeError::BlankId.into()),
            Some(id) => id,
            None => bounded(self.config.io_timeout, self.store.next_entity_id(pool))
                .await
                .map_err(MatchingError::StorageWrite)?,
        };

        let embedding = match embedding {
            Some(vector) => Some(self.check_embedding(vector)?),
            None => match description.as_deref().filter(|text| !text.trim().is_empty()) {
                Some(text) => self.embed(&id, text).await,
                None => None,
            },
        };

        let entity = Entity {
            id,
            pool,
            display_name,
            attributes,
            preferences,
            description,
            embedding,
            created_at: Utc::now(),
        };

        let stored = bounded(self.config.io_timeout, self.store.insert_entity(entity))
            .await
            .map_err(MatchingError::StorageWrite)?;
        info!(entity = %stored.id, pool = stored.pool.label(), "entity admitted");
        Ok(stored)
    }

    /// Online match for a freshly admitted entity: score, rank, record top-1, announce.
    ///
    /// The edge is written without a duplicate check because a new entity cannot already
    /// have one. Fan-out starts only after the write succeeded, and its failure is reported in
    /// the outcome rather than as an error.
    pub async fn match_entity(&self, entity: &Entity) -> Result<MatchReport, MatchingError> {
        let ranked = self.rank_candidates(entity).await?;

        let Some(chosen) = ranked.first() else {
            info!(entity = %entity.id, "no counterparts available; no match");
            return Ok(MatchReport {
                entity: entity.clone(),
                outcome: MatchOutcome::NoMatch,
            });
        };

        let record = self
            .recorder
            .record(entity, chosen)
            .await
            .map_err(MatchingError::StorageWrite)?;

        let entries: Vec<RankedEntry> = ranked.iter().map(RankedEntry::from).collect();
        let (side_a, side_b) = self
            .fanout
            .prepare(&record, entity, &chosen.counterpart, &entries)
            .await;
        let notification = self.fanout.publish(&record, side_a, side_b).await;

        Ok(MatchReport {
            entity: entity.clone(),
            outcome: MatchOutcome::Matched {
                record,
                ranked: entries,
                notification,
            },
        })
    }

    /// Score every opposite-pool counterpart and return the top-k, best first.
    pub async fn rank_candidates(
        &self,
        entity: &Entity,
    ) -> Result<Vec<MatchCandidate>, MatchingError> {
        let timeout = self.config.io_timeout;
        let (counterparts, counts) = futures::try_join!(
            bounded(timeout, self.store.list_pool(entity.pool.opposite())),
            bounded(timeout, self.store.match_counts()),
        )
        .map_err(MatchingError::StorageRead)?;

        if counterparts.is_empty() {
            return Ok(Vec::new());
        }

        let collaborative = collaborative_inputs(
            self.store.as_ref(),
            timeout,
            &self.scorer,
            entity,
            &counterparts,
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

        Ok(rank(candidates, &counts, self.config.top_k))
    }

    pub async fn matches_for(&self, id: &EntityId) -> Result<Vec<Match>, MatchingError> {
        let timeout = self.config.io_timeout;
        let entity = bounded(timeout, self.store.fetch_entity(id))
            .await
            .map_err(MatchingError::StorageRead)?;
        if entity.is_none() {
            return Err(MatchingError::UnknownEntity(id.to_string()));
        }

        bounded(timeout, self.store.matches_for(id))
            .await
            .map_err(MatchingError::StorageRead)
    }

    /// Offline matcher sharing this service's store and scorer.
    pub fn batch(&self) -> BatchMatcher<S> {
        BatchMatcher::new(self.store.clone(), self.scorer.clone(), self.config.clone())
    }

    fn check_embedding(&self, vector: Vec<f32>) -> Result<Vec<f32>, IntakeError> {
        if vector.len() != self.config.embedding_dimension {
            return Err(IntakeError::EmbeddingDimension {
                expected: self.config.embedding_dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(IntakeError::NonFiniteEmbedding);
        }
        Ok(vector)
    }

    // The semantic signal is auxiliary; an embedding failure leaves the entity without one.
    async fn embed(&self, id: &EntityId, text: &str) -> Option<Vec<f32>> {
        let result =
            match tokio::time::timeout(self.config.io_timeout, self.embedder.embed(text)).await {
                Ok(result) => result,
                Err(_) => Err(EmbeddingError::Timeout(self.config.io_timeout)),
            };

        match result {
            Ok(vector) => Some(vector),
            Err(err) => {
                warn!(
                    entity = %id,
                    model = self.embedder.model_version(),
                    error = %err,
                    "embedding unavailable; semantic signal will be omitted"
                );
                None
            }
        }
    }
}
