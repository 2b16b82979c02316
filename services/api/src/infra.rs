use matchmaker::error::AppError;
use matchmaker::matching::{InMemoryMatchStore, StoreSnapshot};
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load a store from a JSON snapshot. A missing file yields an empty store.
pub(crate) fn load_store(path: &Path) -> Result<InMemoryMatchStore, AppError> {
    let snapshot = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<StoreSnapshot>(&raw)?,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "snapshot not found; starting empty");
            StoreSnapshot::default()
        }
        Err(err) => return Err(err.into()),
    };

    info!(
        path = %path.display(),
        entities = snapshot.entities.len(),
        matches = snapshot.matches.len(),
        "snapshot loaded"
    );
    Ok(InMemoryMatchStore::from_snapshot(snapshot))
}

/// Write the store back as pretty JSON, replacing the file atomically.
pub(crate) fn save_store(path: &Path, store: &InMemoryMatchStore) -> Result<(), AppError> {
    let snapshot = store.snapshot();
    let json = serde_json::to_string_pretty(&snapshot)?;

    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json)?;
    fs::rename(&staging, path)?;

    info!(
        path = %path.display(),
        entities = snapshot.entities.len(),
        matches = snapshot.matches.len(),
        "snapshot saved"
    );
    Ok(())
}
