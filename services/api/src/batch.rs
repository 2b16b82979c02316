use crate::infra::{load_store, save_store};
use clap::Args;
use matchmaker::config::AppConfig;
use matchmaker::error::AppError;
use matchmaker::matching::{BatchOptions, BatchReport, LocalBroadcast, MatchmakingService};
use matchmaker::telemetry;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// JSON snapshot holding entities and existing matches; rewritten unless --dry-run
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Minimum final score for a pair to be recorded
    #[arg(long, default_value_t = 0.5)]
    pub(crate) threshold: f64,
    /// Report what would be created without writing anything
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Write one CSV row per scanned pair to this path
    #[arg(long)]
    pub(crate) decisions_csv: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DecisionRow<'a> {
    from_entity_id: &'a str,
    to_entity_id: &'a str,
    score: String,
    action: &'static str,
    match_id: &'a str,
}

pub(crate) async fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let BatchArgs {
        snapshot,
        threshold,
        dry_run,
        decisions_csv,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = Arc::new(load_store(&snapshot)?);
    let service = MatchmakingService::new(
        store.clone(),
        Arc::new(LocalBroadcast::default()),
        config.matching,
    )?;

    let report = service
        .batch()
        .run(BatchOptions { threshold, dry_run })
        .await?;

    if !dry_run && report.created > 0 {
        save_store(&snapshot, &store)?;
    }

    if let Some(path) = decisions_csv {
        let file = std::fs::File::create(&path)?;
        write_decisions(file, &report).map_err(io::Error::from)?;
        info!(path = %path.display(), rows = report.decisions.len(), "batch decisions exported");
    }

    println!("{}", report.summary());
    Ok(())
}

pub(crate) fn write_decisions<W: io::Write>(
    writer: W,
    report: &BatchReport,
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    for decision in &report.decisions {
        csv.serialize(DecisionRow {
            from_entity_id: decision.from_entity_id.as_str(),
            to_entity_id: decision.to_entity_id.as_str(),
            score: format!("{:.4}", decision.score),
            action: decision.action.label(),
            match_id: decision
                .match_id
                .as_ref()
                .map(|id| id.0.as_str())
                .unwrap_or(""),
        })?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchmaker::matching::{EntityId, MatchId, PairAction, PairDecision};

    #[test]
    fn decisions_export_one_row_per_pair() {
        let report = BatchReport {
            threshold: 0.5,
            dry_run: false,
            pairs_scanned: 2,
            created: 1,
            would_create: 0,
            already_matched: 0,
            below_threshold: 1,
            decisions: vec![
                PairDecision {
                    from_entity_id: EntityId::from("a-1"),
                    to_entity_id: EntityId::from("b-1"),
                    score: 1.0,
                    action: PairAction::Created,
                    match_id: Some(MatchId("match-000001".to_string())),
                },
                PairDecision {
                    from_entity_id: EntityId::from("a-1"),
                    to_entity_id: EntityId::from("b-2"),
                    score: 0.25,
                    action: PairAction::BelowThreshold,
                    match_id: None,
                },
            ],
        };

        let mut buffer = Vec::new();
        write_decisions(&mut buffer, &report).expect("csv written");
        let text = String::from_utf8(buffer).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "from_entity_id,to_entity_id,score,action,match_id",
                "a-1,b-1,1.0000,created,match-000001",
                "a-1,b-2,0.2500,below_threshold,",
            ]
        );
    }
}
