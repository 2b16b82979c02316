use crate::cli::ServeArgs;
use crate::infra::{load_store, AppState};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use matchmaker::config::AppConfig;
use matchmaker::error::AppError;
use matchmaker::matching::{InMemoryMatchStore, LocalBroadcast, MatchmakingService};
use matchmaker::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = match args.snapshot.as_deref() {
        Some(path) => load_store(path)?,
        None => InMemoryMatchStore::default(),
    };
    let channel = Arc::new(LocalBroadcast::default());
    // Scoring configuration is validated here, before the listener binds.
    let matching_service = Arc::new(MatchmakingService::new(
        Arc::new(store),
        channel,
        config.matching.clone(),
    )?);

    let app = with_matching_routes(matching_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        profile = config.matching.profile.name(),
        topic = %config.matching.topic,
        "matchmaker ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
