use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::matching::domain::{
    AttributeValue, Entity, EntityId, Match, MatchDraft, MatchOrigin, NewEntity, PoolTag,
    Preference,
};
use crate::matching::notify::{
    AnnouncementRequest, Announcer, AnnouncerError, BroadcastChannel, LocalBroadcast, MatchEvent,
    PublishError, SubscribeError, SubscriptionAck,
};
use crate::matching::repository::{MatchStore, StorageError};
use crate::matching::{
    InMemoryMatchStore, MatchingConfig, MatchmakingService, SatisfactionResult, ScoreBreakdown,
};

pub(super) const TOPIC: &str = "matches";

pub(super) fn config() -> MatchingConfig {
    MatchingConfig {
        io_timeout: Duration::from_millis(500),
        embedding_dimension: 8,
        ..MatchingConfig::default()
    }
}

pub(super) fn entity(id: &str, pool: PoolTag, name: &str) -> Entity {
    Entity {
        id: EntityId::from(id),
        pool,
        display_name: Some(name.to_string()),
        attributes: Default::default(),
        preferences: Default::default(),
        description: None,
        embedding: None,
        created_at: Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub(super) fn with_attribute(
    mut entity: Entity,
    key: &str,
    value: impl Into<AttributeValue>,
) -> Entity {
    entity.attributes.insert(key.to_string(), value.into());
    entity
}

pub(super) fn with_preference(mut entity: Entity, key: &str, preference: Preference) -> Entity {
    entity.preferences.insert(key.to_string(), preference);
    entity
}

pub(super) fn with_embedding(mut entity: Entity, embedding: Vec<f32>) -> Entity {
    entity.embedding = Some(embedding);
    entity
}

pub(super) fn arrival(id: &str, pool: PoolTag, name: &str) -> NewEntity {
    NewEntity {
        id: Some(EntityId::from(id)),
        pool,
        display_name: Some(name.to_string()),
        attributes: Default::default(),
        preferences: Default::default(),
        description: None,
        embedding: None,
    }
}

pub(super) async fn seeded_store(entities: Vec<Entity>) -> Arc<InMemoryMatchStore> {
    let store = Arc::new(InMemoryMatchStore::default());
    for entity in entities {
        store.insert_entity(entity).await.expect("seed entity");
    }
    store
}

pub(super) fn build_service(
    store: Arc<InMemoryMatchStore>,
) -> (
    MatchmakingService<InMemoryMatchStore, LocalBroadcast>,
    Arc<LocalBroadcast>,
) {
    let channel = Arc::new(LocalBroadcast::default());
    let service =
        MatchmakingService::new(store, channel.clone(), config()).expect("valid configuration");
    (service, channel)
}

pub(super) fn draft(from: &str, to: &str, score: f64) -> MatchDraft {
    MatchDraft {
        origin: MatchOrigin::Online,
        from_entity_id: EntityId::from(from),
        to_entity_id: EntityId::from(to),
        score,
        breakdown: ScoreBreakdown {
            profile: "preference_only".to_string(),
            preference_score: score,
            auxiliary_signals: Default::default(),
            omitted_signals: Vec::new(),
            weights: Default::default(),
        },
        forward: SatisfactionResult::vacuous(),
        reverse: SatisfactionResult::vacuous(),
        matched_at: Utc::now(),
    }
}

/// Store whose every call fails as if the backend were unreachable.
pub(super) struct UnavailableStore;

fn offline() -> StorageError {
    StorageError::Unavailable("database offline".to_string())
}

#[async_trait]
impl MatchStore for UnavailableStore {
    async fn next_entity_id(&self, _pool: PoolTag) -> Result<EntityId, StorageError> {
        Err(offline())
    }

    async fn insert_entity(&self, _entity: Entity) -> Result<Entity, StorageError> {
        Err(offline())
    }

    async fn fetch_entity(&self, _id: &EntityId) -> Result<Option<Entity>, StorageError> {
        Err(offline())
    }

    async fn list_pool(&self, _pool: PoolTag) -> Result<Vec<Entity>, StorageError> {
        Err(offline())
    }

    async fn match_counts(&self) -> Result<HashMap<EntityId, u32>, StorageError> {
        Err(offline())
    }

    async fn prior_match_scores(
        &self,
        _counterpart: &EntityId,
        _peers: &[EntityId],
    ) -> Result<Vec<f64>, StorageError> {
        Err(offline())
    }

    async fn find_edge(&self, _a: &EntityId, _b: &EntityId) -> Result<Option<Match>, StorageError> {
        Err(offline())
    }

    async fn create_edge(&self, _draft: MatchDraft) -> Result<Match, StorageError> {
        Err(offline())
    }

    async fn list_matches(&self) -> Result<Vec<Match>, StorageError> {
        Err(offline())
    }

    async fn matches_for(&self, _id: &EntityId) -> Result<Vec<Match>, StorageError> {
        Err(offline())
    }
}

/// Reads succeed from the wrapped store; edge writes fail.
pub(super) struct ReadOnlyStore {
    pub(super) inner: InMemoryMatchStore,
}

#[async_trait]
impl MatchStore for ReadOnlyStore {
    async fn next_entity_id(&self, pool: PoolTag) -> Result<EntityId, StorageError> {
        self.inner.next_entity_id(pool).await
    }

    async fn insert_entity(&self, entity: Entity) -> Result<Entity, StorageError> {
        self.inner.insert_entity(entity).await
    }

    async fn fetch_entity(&self, id: &EntityId) -> Result<Option<Entity>, StorageError> {
        self.inner.fetch_entity(id).await
    }

    async fn list_pool(&self, pool: PoolTag) -> Result<Vec<Entity>, StorageError> {
        self.inner.list_pool(pool).await
    }

    async fn match_counts(&self) -> Result<HashMap<EntityId, u32>, StorageError> {
        self.inner.match_counts().await
    }

    async fn prior_match_scores(
        &self,
        counterpart: &EntityId,
        peers: &[EntityId],
    ) -> Result<Vec<f64>, StorageError> {
        self.inner.prior_match_scores(counterpart, peers).await
    }

    async fn find_edge(&self, a: &EntityId, b: &EntityId) -> Result<Option<Match>, StorageError> {
        self.inner.find_edge(a, b).await
    }

    async fn create_edge(&self, _draft: MatchDraft) -> Result<Match, StorageError> {
        Err(StorageError::Unavailable("read only replica".to_string()))
    }

    async fn list_matches(&self) -> Result<Vec<Match>, StorageError> {
        self.inner.list_matches().await
    }

    async fn matches_for(&self, id: &EntityId) -> Result<Vec<Match>, StorageError> {
        self.inner.matches_for(id).await
    }
}

/// Topic that refuses every subscription and counts attempted sends.
#[derive(Default)]
pub(super) struct RejectingChannel {
    pub(super) sends: AtomicUsize,
}

impl RejectingChannel {
    pub(super) fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BroadcastChannel for RejectingChannel {
    async fn subscribe(&self, _topic: &str) -> Result<SubscriptionAck, SubscribeError> {
        Err(SubscribeError::Rejected("topic unavailable".to_string()))
    }

    async fn send(&self, _topic: &str, _event: &MatchEvent) -> Result<(), PublishError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe(&self, _topic: &str) {}
}

/// Topic that confirms subscriptions but drops every send.
pub(super) struct BrokenSendChannel;

#[async_trait]
impl BroadcastChannel for BrokenSendChannel {
    async fn subscribe(&self, topic: &str) -> Result<SubscriptionAck, SubscribeError> {
        Ok(SubscriptionAck {
            topic: topic.to_string(),
        })
    }

    async fn send(&self, _topic: &str, _event: &MatchEvent) -> Result<(), PublishError> {
        Err(PublishError::Transport("socket reset".to_string()))
    }

    async fn unsubscribe(&self, _topic: &str) {}
}

/// Topic that never confirms a subscription.
pub(super) struct SilentChannel;

#[async_trait]
impl BroadcastChannel for SilentChannel {
    async fn subscribe(&self, _topic: &str) -> Result<SubscriptionAck, SubscribeError> {
        std::future::pending().await
    }

    async fn send(&self, _topic: &str, _event: &MatchEvent) -> Result<(), PublishError> {
        Ok(())
    }

    async fn unsubscribe(&self, _topic: &str) {}
}

pub(super) struct FailingAnnouncer;

#[async_trait]
impl Announcer for FailingAnnouncer {
    async fn announce(&self, _request: AnnouncementRequest<'_>) -> Result<String, AnnouncerError> {
        Err(AnnouncerError::Unavailable("model offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
