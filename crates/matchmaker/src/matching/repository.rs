use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::domain::{Entity, EntityId, Match, MatchDraft, PoolTag};

/// Storage collaborator: filtered reads and edge creation. No cross-call transactions.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Fresh pool-tagged id not held by any stored entity.
    async fn next_entity_id(&self, pool: PoolTag) -> Result<EntityId, StorageError>;
    async fn insert_entity(&self, entity: Entity) -> Result<Entity, StorageError>;
    async fn fetch_entity(&self, id: &EntityId) -> Result<Option<Entity>, StorageError>;
    async fn list_pool(&self, pool: PoolTag) -> Result<Vec<Entity>, StorageError>;
    /// Existing match count per entity id, counting both edge endpoints.
    async fn match_counts(&self) -> Result<HashMap<EntityId, u32>, StorageError>;
    /// Scores of prior online matches joining `counterpart` with any of `peers`.
    ///
    /// Batch-written edges are excluded so a batch run never feeds its own output back into
    /// the collaborative signal.
    async fn prior_match_scores(
        &self,
        counterpart: &EntityId,
        peers: &[EntityId],
    ) -> Result<Vec<f64>, StorageError>;
    /// Edge between `a` and `b` in either direction.
    async fn find_edge(&self, a: &EntityId, b: &EntityId) -> Result<Option<Match>, StorageError>;
    async fn create_edge(&self, draft: MatchDraft) -> Result<Match, StorageError>;
    async fn list_matches(&self) -> Result<Vec<Match>, StorageError>;
    async fn matches_for(&self, id: &EntityId) -> Result<Vec<Match>, StorageError>;
}

/// Error enumeration for storage collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
}

/// Run a storage call under `limit`, mapping an elapsed deadline to [`StorageError::Timeout`].
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(limit)),
    }
}
