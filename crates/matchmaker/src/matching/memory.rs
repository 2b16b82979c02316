use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{Entity, EntityId, Match, MatchDraft, MatchId, MatchOrigin, PoolTag};
use super::repository::{MatchStore, StorageError};

/// Serializable dump of a store, used to persist batch runs between processes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub matches: Vec<Match>,
}

#[derive(Default)]
struct StoreState {
    entities: Vec<Entity>,
    matches: Vec<Match>,
}

/// Process-local store backed by vectors behind a mutex.
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    state: Arc<Mutex<StoreState>>,
    sequence: Arc<AtomicU64>,
    entity_sequence: Arc<AtomicU64>,
}

impl InMemoryMatchStore {
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let last_match = highest_suffix(snapshot.matches.iter().map(|record| {
            record.id.0.strip_prefix("match-")
        }));
        let last_entity = highest_suffix(snapshot.entities.iter().map(|entity| {
            entity
                .id
                .0
                .strip_prefix(entity.pool.label())
                .and_then(|rest| rest.strip_prefix('-'))
        }));

        Self {
            state: Arc::new(Mutex::new(StoreState {
                entities: snapshot.entities,
                matches: snapshot.matches,
            })),
            sequence: Arc::new(AtomicU64::new(last_match)),
            entity_sequence: Arc::new(AtomicU64::new(last_entity)),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock().expect("store mutex poisoned");
        StoreSnapshot {
            entities: state.entities.clone(),
            matches: state.matches.clone(),
        }
    }

    fn next_match_id(&self) -> MatchId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        MatchId(format!("match-{id:06}"))
    }
}

fn highest_suffix<'a>(suffixes: impl Iterator<Item = Option<&'a str>>) -> u64 {
    suffixes
        .flatten()
        .filter_map(|raw| raw.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn next_entity_id(&self, pool: PoolTag) -> Result<EntityId, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        // Caller-supplied ids may sit ahead of the sequence.
        loop {
            let next = self.entity_sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let id = EntityId(format!("{}-{next:06}", pool.label()));
            if !state.entities.iter().any(|entity| entity.id == id) {
                return Ok(id);
            }
        }
    }

    async fn insert_entity(&self, entity: Entity) -> Result<Entity, StorageError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state.entities.iter().any(|existing| existing.id == entity.id) {
            return Err(StorageError::Conflict);
        }
        state.entities.push(entity.clone());
        Ok(entity)
    }

    async fn fetch_entity(&self, id: &EntityId) -> Result<Option<Entity>, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.entities.iter().find(|entity| &entity.id == id).cloned())
    }

    async fn list_pool(&self, pool: PoolTag) -> Result<Vec<Entity>, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .entities
            .iter()
            .filter(|entity| entity.pool == pool)
            .cloned()
            .collect())
    }

    async fn match_counts(&self) -> Result<HashMap<EntityId, u32>, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut counts = HashMap::new();
        for record in &state.matches {
            *counts.entry(record.from_entity_id.clone()).or_insert(0) += 1;
            *counts.entry(record.to_entity_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn prior_match_scores(
        &self,
        counterpart: &EntityId,
        peers: &[EntityId],
    ) -> Result<Vec<f64>, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .matches
            .iter()
            .filter(|record| record.origin == MatchOrigin::Online)
            .filter(|record| peers.iter().any(|peer| record.connects(peer, counterpart)))
            .map(|record| record.score)
            .collect())
    }

    async fn find_edge(&self, a: &EntityId, b: &EntityId) -> Result<Option<Match>, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .matches
            .iter()
            .find(|record| record.connects(a, b))
            .cloned())
    }

    async fn create_edge(&self, draft: MatchDraft) -> Result<Match, StorageError> {
        let record = Match::from_draft(self.next_match_id(), draft);
        let mut state = self.state.lock().expect("store mutex poisoned");
        state.matches.push(record.clone());
        Ok(record)
    }

    async fn list_matches(&self) -> Result<Vec<Match>, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state.matches.clone())
    }

    async fn matches_for(&self, id: &EntityId) -> Result<Vec<Match>, StorageError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .matches
            .iter()
            .filter(|record| record.involves(id))
            .cloned()
            .collect())
    }
}
