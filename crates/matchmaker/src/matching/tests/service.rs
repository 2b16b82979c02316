use std::sync::Arc;

use super::common::*;
use crate::matching::batch::{BatchOptions, PairAction};
use crate::matching::domain::{EntityId, PoolTag, Preference};
use crate::matching::error::{IntakeError, MatchingError};
use crate::matching::notify::{LocalBroadcast, NotificationOutcome, TemplateAnnouncer};
use crate::matching::repository::{MatchStore, StorageError};
use crate::matching::scoring::{ScoringConfigError, SignalKind, WeightProfile};
use crate::matching::{
    HashingEmbedder, InMemoryMatchStore, MatchOrigin, MatchOutcome, MatchingConfig,
    MatchmakingService, StoreSnapshot,
};

#[tokio::test]
async fn scenario_a_no_preferences_on_either_side_scores_one() {
    let store = seeded_store(vec![entity("b-1", PoolTag::B, "Birch")]).await;
    let (service, _) = build_service(store);

    let report = service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect("matching succeeds");

    let record = report.record().expect("a match was recorded");
    assert_eq!(record.breakdown.preference_score, 1.0);
    assert!(record.score >= 0.99);
    assert_eq!(record.to_entity_id, EntityId::from("b-1"));
}

#[tokio::test]
async fn scenario_b_violation_is_recorded_and_reverse_is_independent() {
    let store = seeded_store(vec![with_attribute(
        entity("b-1", PoolTag::B, "Birch"),
        "size",
        8.0,
    )])
    .await;
    let (service, _) = build_service(store);

    let mut submission = arrival("a-1", PoolTag::A, "Aspen");
    submission
        .preferences
        .insert("size".to_string(), Preference::at_least(10.0));

    let report = service.register(submission).await.expect("matching succeeds");

    let record = report.record().expect("a match was recorded");
    assert!(record.forward.is_violated("size"));
    assert_eq!(record.forward.violated[0].summary(), "size: 8 < 10");
    assert_eq!(record.reverse.score, 1.0);
}

#[tokio::test]
async fn scenario_c_empty_opposite_pool_is_no_match() {
    let store = seeded_store(vec![entity("a-0", PoolTag::A, "Alder")]).await;
    let channel = Arc::new(RejectingChannel::default());
    let service = MatchmakingService::new(store.clone(), channel.clone(), config())
        .expect("valid configuration");

    let report = service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect("no match is not an error");

    assert_eq!(report.outcome, MatchOutcome::NoMatch);
    assert!(store.list_matches().await.expect("list").is_empty());
    assert_eq!(channel.sends(), 0);
}

#[tokio::test]
async fn scenario_d_subscribe_failure_keeps_the_match() {
    let store = seeded_store(vec![entity("b-1", PoolTag::B, "Birch")]).await;
    let channel = Arc::new(RejectingChannel::default());
    let service = MatchmakingService::new(store.clone(), channel.clone(), config())
        .expect("valid configuration");

    let report = service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect("request still succeeds");

    let notification = report.notification().expect("match was recorded");
    assert!(matches!(notification, NotificationOutcome::Failed { .. }));
    assert_eq!(channel.sends(), 0);
    assert_eq!(store.list_matches().await.expect("list").len(), 1);
}

#[tokio::test]
async fn successful_match_is_announced_to_both_sides() {
    let store = seeded_store(vec![entity("b-1", PoolTag::B, "Birch")]).await;
    let (service, channel) = build_service(store);
    let mut for_a = channel.listen_for(TOPIC, EntityId::from("a-1"));
    let mut for_b = channel.listen_for(TOPIC, EntityId::from("b-1"));

    let report = service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect("matching succeeds");

    assert!(report.notification().expect("matched").is_delivered());
    assert!(for_a.try_next().is_some());
    assert!(for_b.try_next().is_some());
}

#[tokio::test]
async fn read_failure_aborts_without_a_match() {
    let service = MatchmakingService::new(
        Arc::new(UnavailableStore),
        Arc::new(LocalBroadcast::default()),
        config(),
    )
    .expect("valid configuration");

    let arriving = entity("a-1", PoolTag::A, "Aspen");
    let err = service
        .match_entity(&arriving)
        .await
        .expect_err("read failure surfaces");

    assert!(matches!(err, MatchingError::StorageRead(_)));
}

#[tokio::test]
async fn write_failure_is_surfaced_and_nothing_is_announced() {
    let inner = InMemoryMatchStore::default();
    inner
        .insert_entity(entity("b-1", PoolTag::B, "Birch"))
        .await
        .expect("seed");
    let channel = Arc::new(RejectingChannel::default());
    let service =
        MatchmakingService::new(Arc::new(ReadOnlyStore { inner }), channel.clone(), config())
            .expect("valid configuration");

    let err = service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect_err("write failure surfaces");

    assert!(matches!(
        err,
        MatchingError::StorageWrite(StorageError::Unavailable(_))
    ));
    assert_eq!(channel.sends(), 0);
}

#[tokio::test]
async fn ranked_list_prefers_less_matched_counterparts_on_ties() {
    let store = seeded_store(vec![
        entity("b-1", PoolTag::B, "Birch"),
        entity("b-2", PoolTag::B, "Cedar"),
        entity("a-0", PoolTag::A, "Alder"),
    ])
    .await;
    store
        .create_edge(draft("a-0", "b-1", 1.0))
        .await
        .expect("seed edge");
    let (service, _) = build_service(store);

    let report = service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect("matching succeeds");

    assert_eq!(
        report.record().expect("matched").to_entity_id,
        EntityId::from("b-2")
    );
}

#[tokio::test]
async fn duplicate_ids_are_rejected_at_intake() {
    let store = seeded_store(vec![entity("a-1", PoolTag::A, "Aspen")]).await;
    let (service, _) = build_service(store);

    let err = service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect_err("id already taken");

    assert!(matches!(
        err,
        MatchingError::StorageWrite(StorageError::Conflict)
    ));
}

#[tokio::test]
async fn intake_assigns_ids_and_rejects_bad_embeddings() {
    let store = seeded_store(Vec::new()).await;
    let (service, _) = build_service(store);

    let mut anonymous = arrival("ignored", PoolTag::B, "Birch");
    anonymous.id = None;
    let admitted = service.admit(anonymous).await.expect("admitted");
    assert_eq!(admitted.id.as_str(), "b-000001");

    let mut blank = arrival("  ", PoolTag::A, "Aspen");
    blank.id = Some(EntityId::from("  "));
    assert!(matches!(
        service.admit(blank).await,
        Err(MatchingError::Intake(IntakeError::BlankId))
    ));

    let mut short = arrival("a-2", PoolTag::A, "Aspen");
    short.embedding = Some(vec![1.0, 0.0]);
    assert!(matches!(
        service.admit(short).await,
        Err(MatchingError::Intake(IntakeError::EmbeddingDimension {
            expected: 8,
            actual: 2
        }))
    ));
}

#[tokio::test]
async fn descriptions_are_embedded_once_at_intake() {
    let store = seeded_store(Vec::new()).await;
    let (service, _) = build_service(store.clone());

    let mut submission = arrival("a-1", PoolTag::A, "Aspen");
    submission.description = Some("quiet studio near the river".to_string());
    let admitted = service.admit(submission).await.expect("admitted");

    let stored = store
        .fetch_entity(&admitted.id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.embedding.as_ref().map(Vec::len), Some(8));
    assert_eq!(stored.embedding, admitted.embedding);
}

#[tokio::test]
async fn generated_ids_skip_entities_loaded_from_a_snapshot() {
    let store = Arc::new(InMemoryMatchStore::from_snapshot(StoreSnapshot {
        entities: vec![
            entity("a-000001", PoolTag::A, "Aspen"),
            entity("a-000002", PoolTag::A, "Alder"),
            entity("b-000007", PoolTag::B, "Birch"),
        ],
        matches: Vec::new(),
    }));
    let (service, _) = build_service(store);

    let mut anonymous = arrival("ignored", PoolTag::A, "Acacia");
    anonymous.id = None;
    let report = service.register(anonymous).await.expect("registered");

    assert_eq!(report.entity.id.as_str(), "a-000008");
    assert_eq!(
        report.record().map(|record| record.to_entity_id.as_str()),
        Some("b-000007")
    );
}

#[tokio::test]
async fn generated_ids_skip_caller_supplied_ids() {
    let store = seeded_store(vec![entity("a-000001", PoolTag::A, "Aspen")]).await;

    let id = store.next_entity_id(PoolTag::A).await.expect("id assigned");

    assert_eq!(id.as_str(), "a-000002");
}

#[tokio::test]
async fn blended_profile_uses_history_of_similar_peers() {
    let peer = with_embedding(entity("a-0", PoolTag::A, "Alder"), vec![1.0; 8]);
    let store = seeded_store(vec![
        peer,
        entity("b-1", PoolTag::B, "Birch"),
        entity("b-2", PoolTag::B, "Cedar"),
    ])
    .await;
    store
        .create_edge(draft("a-0", "b-2", 0.9))
        .await
        .expect("seed edge");

    let channel = Arc::new(LocalBroadcast::default());
    let service = MatchmakingService::new(
        store,
        channel,
        config().with_profile(WeightProfile::blended()),
    )
    .expect("valid configuration");

    let arriving = with_embedding(entity("a-1", PoolTag::A, "Aspen"), vec![1.0; 8]);
    let ranked = service
        .rank_candidates(&arriving)
        .await
        .expect("ranking succeeds");

    let cedar = ranked
        .iter()
        .find(|candidate| candidate.counterpart.id.as_str() == "b-2")
        .expect("b-2 ranked");
    let birch = ranked
        .iter()
        .find(|candidate| candidate.counterpart.id.as_str() == "b-1")
        .expect("b-1 ranked");
    assert!((cedar.breakdown.auxiliary_signals[&SignalKind::Collaborative] - 0.9).abs() < 1e-9);
    assert_eq!(
        birch.breakdown.auxiliary_signals[&SignalKind::Collaborative],
        0.0
    );
    assert_eq!(ranked[0].counterpart.id.as_str(), "b-2");
}

#[tokio::test]
async fn mismatched_embedder_dimension_fails_configuration() {
    let result = MatchmakingService::with_collaborators(
        Arc::new(InMemoryMatchStore::default()),
        Arc::new(LocalBroadcast::default()),
        Arc::new(TemplateAnnouncer),
        Arc::new(HashingEmbedder::new(16)),
        config(),
    );

    assert!(matches!(
        result.err(),
        Some(ScoringConfigError::EmbeddingDimensionMismatch {
            expected: 8,
            actual: 16
        })
    ));
}

#[tokio::test]
async fn matches_for_unknown_entity_is_not_found() {
    let (service, _) = build_service(seeded_store(Vec::new()).await);

    let err = service
        .matches_for(&EntityId::from("missing"))
        .await
        .expect_err("unknown entity");

    assert!(matches!(err, MatchingError::UnknownEntity(_)));
}

#[tokio::test]
async fn batch_is_idempotent() {
    let store = seeded_store(vec![
        entity("a-1", PoolTag::A, "Aspen"),
        entity("a-2", PoolTag::A, "Alder"),
        entity("b-1", PoolTag::B, "Birch"),
    ])
    .await;
    let (service, _) = build_service(store.clone());
    let options = BatchOptions {
        threshold: 0.5,
        dry_run: false,
    };

    let first = service.batch().run(options).await.expect("first run");
    let second = service.batch().run(options).await.expect("second run");

    assert_eq!(first.created, 2);
    assert_eq!(second.created, 0);
    assert_eq!(second.already_matched, 2);
    assert_eq!(store.list_matches().await.expect("list").len(), 2);
}

#[tokio::test]
async fn batch_is_idempotent_under_blended_profile() {
    let shared = vec![1.0; 8];
    let store = seeded_store(vec![
        with_embedding(
            with_attribute(entity("a-1", PoolTag::A, "Aspen"), "x", 1.0),
            shared.clone(),
        ),
        with_embedding(
            with_attribute(entity("a-2", PoolTag::A, "Alder"), "x", 2.0),
            shared.clone(),
        ),
        with_embedding(
            with_preference(
                entity("b-2", PoolTag::B, "Birch"),
                "x",
                Preference::at_least(2.0),
            ),
            shared,
        ),
    ])
    .await;
    let channel = Arc::new(LocalBroadcast::default());
    let service = MatchmakingService::new(
        store.clone(),
        channel,
        config().with_profile(WeightProfile::blended()),
    )
    .expect("valid configuration");
    let options = BatchOptions {
        threshold: 0.6,
        dry_run: false,
    };

    let first = service.batch().run(options).await.expect("first run");
    let second = service.batch().run(options).await.expect("second run");

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.already_matched, 1);
    let aspen = second
        .decisions
        .iter()
        .find(|decision| decision.from_entity_id.as_str() == "a-1")
        .expect("a-1 scanned");
    assert_eq!(aspen.action, PairAction::BelowThreshold);
    assert!((aspen.score - 0.55).abs() < 1e-6);

    let matches = store.list_matches().await.expect("list");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].origin, MatchOrigin::Batch);
}

#[tokio::test]
async fn batch_skips_pairs_joined_by_an_online_edge() {
    let store = seeded_store(vec![entity("b-1", PoolTag::B, "Birch")]).await;
    let (service, _) = build_service(store.clone());
    service
        .register(arrival("a-1", PoolTag::A, "Aspen"))
        .await
        .expect("online match");

    let report = service
        .batch()
        .run(BatchOptions::default())
        .await
        .expect("batch run");

    assert_eq!(report.created, 0);
    assert_eq!(report.decisions[0].action, PairAction::AlreadyMatched);
}

#[tokio::test]
async fn batch_dry_run_writes_nothing_and_respects_threshold() {
    let store = seeded_store(vec![
        with_preference(
            entity("a-1", PoolTag::A, "Aspen"),
            "size",
            Preference::at_least(10.0),
        ),
        with_attribute(entity("b-1", PoolTag::B, "Birch"), "size", 4.0),
        with_attribute(entity("b-2", PoolTag::B, "Cedar"), "size", 12.0),
    ])
    .await;
    let (service, _) = build_service(store.clone());

    let report = service
        .batch()
        .run(BatchOptions {
            threshold: 0.75,
            dry_run: true,
        })
        .await
        .expect("dry run");

    assert_eq!(report.would_create, 1);
    assert_eq!(report.below_threshold, 1);
    assert_eq!(report.decisions[0].to_entity_id, EntityId::from("b-2"));
    assert!(store.list_matches().await.expect("list").is_empty());
}

#[tokio::test]
async fn batch_rejects_out_of_range_threshold() {
    let (service, _) = build_service(seeded_store(Vec::new()).await);

    let err = service
        .batch()
        .run(BatchOptions {
            threshold: 1.5,
            dry_run: false,
        })
        .await
        .expect_err("threshold out of range");

    assert!(matches!(err, MatchingError::InvalidThreshold(_)));
}

#[tokio::test]
async fn batch_read_failure_aborts() {
    let service = MatchmakingService::new(
        Arc::new(UnavailableStore),
        Arc::new(LocalBroadcast::default()),
        MatchingConfig::default(),
    )
    .expect("valid configuration");

    let err = service
        .batch()
        .run(BatchOptions::default())
        .await
        .expect_err("read failure");

    assert!(matches!(err, MatchingError::StorageRead(_)));
}
