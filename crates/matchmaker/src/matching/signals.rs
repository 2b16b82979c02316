use std::collections::HashMap;
use std::time::Duration;

use futures::future::try_join_all;
use tracing::debug;

use super::domain::{Entity, EntityId};
use super::repository::{bounded, MatchStore, StorageError};
use super::scoring::{collaborative_signal, similar_peers, Scorer, SignalKind};

/// Collaborative signal per counterpart id for `entity`.
///
/// Looks up the `peer_limit` same-pool entities most similar to `entity`, then reads the prior
/// match scores between those peers and each counterpart. Reads for different counterparts are
/// issued concurrently and joined before returning. Counterparts without history are absent
/// from the map, which the scorer reads as `0`.
pub(crate) async fn collaborative_inputs<S>(
    store: &S,
    timeout: Duration,
    scorer: &Scorer,
    entity: &Entity,
    counterparts: &[Entity],
    peer_limit: usize,
) -> Result<HashMap<EntityId, f64>, StorageError>
where
    S: MatchStore + ?Sized,
{
    if !scorer.uses(SignalKind::Collaborative) || entity.embedding.is_none() || peer_limit == 0 {
        return Ok(HashMap::new());
    }

    let same_pool = bounded(timeout, store.list_pool(entity.pool)).await?;
    let peers = similar_peers(entity, &same_pool, peer_limit);
    if peers.is_empty() {
        return Ok(HashMap::new());
    }
    debug!(entity = %entity.id, peers = peers.len(), "collaborative peers selected");

    let peers = &peers;
    let lookups = counterparts.iter().map(|counterpart| async move {
        let scores = bounded(timeout, store.prior_match_scores(&counterpart.id, peers)).await?;
        Ok::<_, StorageError>((counterpart.id.clone(), scores))
    });

    let history = try_join_all(lookups).await?;
    Ok(history
        .into_iter()
        .filter(|(_, scores)| !scores.is_empty())
        .map(|(id, scores)| (id, collaborative_signal(&scores)))
        .collect())
}
