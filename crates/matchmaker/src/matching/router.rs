use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::batch::BatchOptions;
use super::domain::{EntityId, NewEntity};
use super::error::MatchingError;
use super::notify::BroadcastChannel;
use super::repository::{MatchStore, StorageError};
use super::service::{MatchOutcome, MatchmakingService};

/// Router builder exposing intake, match lookup, and batch recomputation.
pub fn matching_router<S, C>(service: Arc<MatchmakingService<S, C>>) -> Router
where
    S: MatchStore + 'static,
    C: BroadcastChannel + 'static,
{
    Router::new()
        .route("/api/v1/entities", post(register_handler::<S, C>))
        .route(
            "/api/v1/entities/:entity_id/matches",
            get(matches_handler::<S, C>),
        )
        .route("/api/v1/matches/batch", post(batch_handler::<S, C>))
        .with_state(service)
}

pub(crate) async fn register_handler<S, C>(
    State(service): State<Arc<MatchmakingService<S, C>>>,
    axum::Json(submission): axum::Json<NewEntity>,
) -> Response
where
    S: MatchStore + 'static,
    C: BroadcastChannel + 'static,
{
    match service.register(submission).await {
        Ok(report) => {
            let status = match report.outcome {
                MatchOutcome::Matched { .. } => StatusCode::CREATED,
                MatchOutcome::NoMatch => StatusCode::OK,
            };
            (status, axum::Json(report)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn matches_handler<S, C>(
    State(service): State<Arc<MatchmakingService<S, C>>>,
    Path(entity_id): Path<String>,
) -> Response
where
    S: MatchStore + 'static,
    C: BroadcastChannel + 'static,
{
    let id = EntityId(entity_id);
    match service.matches_for(&id).await {
        Ok(matches) => {
            let payload = json!({
                "entity_id": id,
                "matches": matches,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn batch_handler<S, C>(
    State(service): State<Arc<MatchmakingService<S, C>>>,
    axum::Json(options): axum::Json<BatchOptions>,
) -> Response
where
    S: MatchStore + 'static,
    C: BroadcastChannel + 'static,
{
    match service.batch().run(options).await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: MatchingError) -> Response {
    let status = match &err {
        MatchingError::Intake(_) | MatchingError::InvalidThreshold(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MatchingError::UnknownEntity(_) => StatusCode::NOT_FOUND,
        MatchingError::StorageWrite(StorageError::Conflict) => StatusCode::CONFLICT,
        MatchingError::StorageRead(_) | MatchingError::StorageWrite(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
