use clap::Args;
use matchmaker::error::AppError;
use matchmaker::matching::{
    EntityId, InMemoryMatchStore, LocalBroadcast, MatchOutcome, MatchingConfig,
    MatchmakingService, NewEntity, NotificationOutcome, NotificationPayload, PoolTag, Preference,
    SignalKind, WeightProfile,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Weight profile: preference_only, semantic, or blended
    #[arg(long)]
    pub(crate) profile: Option<String>,
    /// Number of ranked candidates to keep
    #[arg(long)]
    pub(crate) top_k: Option<usize>,
    /// Minimum room size the sample seeker asks for
    #[arg(long, default_value_t = 2.0)]
    pub(crate) min_rooms: f64,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = MatchingConfig::default();
    if let Some(name) = args.profile.as_deref() {
        config.profile = WeightProfile::from_name(name)?;
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k.max(1);
    }

    let store = Arc::new(InMemoryMatchStore::default());
    let channel = Arc::new(LocalBroadcast::default());
    let service = MatchmakingService::new(store, channel.clone(), config)?;

    for listing in sample_listings() {
        service.admit(listing).await?;
    }

    let seeker = sample_seeker(args.min_rooms);
    let seeker_id = seeker.id.clone().unwrap_or_else(|| EntityId::from("a-demo"));
    let topic = service.config().topic.clone();
    let mut seeker_inbox = channel.listen_for(&topic, seeker_id);

    println!("Matchmaking demo");
    println!(
        "Profile: {} | top-k: {} | topic: {}",
        service.config().profile.name(),
        service.config().top_k,
        topic
    );

    let report = service.register(seeker).await?;
    println!("\nArrival: {} ({})", report.entity.name(), report.entity.id);

    let MatchOutcome::Matched {
        record,
        ranked,
        notification,
    } = report.outcome
    else {
        println!("No counterparts available; no match recorded.");
        return Ok(());
    };

    println!("\nRanked candidates");
    for (position, entry) in ranked.iter().enumerate() {
        println!(
            "{:>2}. {:<22} {:<8} score {:.3}",
            position + 1,
            entry.name,
            entry.id.as_str(),
            entry.score
        );
    }

    println!("\nRecorded match {}", record.id);
    println!(
        "  {} -> {} | final score {:.3} | preference score {:.3}",
        record.from_entity_id,
        record.to_entity_id,
        record.score,
        record.breakdown.preference_score
    );
    for (signal, weight) in &record.breakdown.weights {
        let value = match signal {
            SignalKind::Preference => record.breakdown.preference_score,
            other => record
                .breakdown
                .auxiliary_signals
                .get(other)
                .copied()
                .unwrap_or(0.0),
        };
        println!(
            "  {:<14} weight {:.2} value {:.3}",
            signal.label(),
            weight,
            value
        );
    }
    for omitted in &record.breakdown.omitted_signals {
        println!("  {:<14} omitted (undefined for this pair)", omitted.label());
    }
    for violation in &record.forward.violated {
        println!("  Seeker preference not met: {}", violation.summary());
    }
    for violation in &record.reverse.violated {
        println!("  Listing preference not met: {}", violation.summary());
    }

    println!("\nNotification");
    match notification {
        NotificationOutcome::Delivered { topic, recipients } => {
            let recipients: Vec<String> = recipients.iter().map(ToString::to_string).collect();
            println!("  Delivered on '{}' to {}", topic, recipients.join(", "));
        }
        NotificationOutcome::Failed { stage, reason } => {
            println!("  Failed during {:?}: {}", stage, reason);
        }
    }

    if let Some(payload) = seeker_inbox.try_next() {
        print_payload(&payload);
    }

    Ok(())
}

fn print_payload(payload: &NotificationPayload) {
    println!("\nSeeker inbox");
    println!("  {}", payload.announcement);
    if payload.other_candidates.is_empty() {
        return;
    }
    println!("  Also considered:");
    for entry in &payload.other_candidates {
        println!("  - {} ({:.3})", entry.name, entry.score);
    }
}

fn listing(
    id: &str,
    name: &str,
    rooms: f64,
    district: &str,
    description: &str,
    pets: bool,
) -> NewEntity {
    let mut entity = NewEntity {
        id: Some(EntityId::from(id)),
        pool: PoolTag::B,
        display_name: Some(name.to_string()),
        attributes: Default::default(),
        preferences: Default::default(),
        description: Some(description.to_string()),
        embedding: None,
    };
    entity.attributes.insert("rooms".to_string(), rooms.into());
    entity
        .attributes
        .insert("district".to_string(), district.into());
    entity
        .preferences
        .insert("pets".to_string(), Preference::exactly(pets));
    entity
}

fn sample_listings() -> Vec<NewEntity> {
    vec![
        listing(
            "b-river",
            "Riverside Loft",
            2.0,
            "harbor",
            "bright loft by the river with a quiet workspace",
            true,
        ),
        listing(
            "b-garden",
            "Garden Flat",
            3.0,
            "old town",
            "ground floor flat with a private garden, pets welcome",
            true,
        ),
        listing(
            "b-tower",
            "Tower Studio",
            1.0,
            "center",
            "compact studio high above the city center",
            false,
        ),
        listing(
            "b-mews",
            "Mews House",
            4.0,
            "old town",
            "family house on a quiet mews near schools",
            false,
        ),
    ]
}

fn sample_seeker(min_rooms: f64) -> NewEntity {
    let mut seeker = NewEntity {
        id: Some(EntityId::from("a-demo")),
        pool: PoolTag::A,
        display_name: Some("Sam".to_string()),
        attributes: Default::default(),
        preferences: Default::default(),
        description: Some("quiet home with a garden for me and my dog".to_string()),
        embedding: None,
    };
    seeker.attributes.insert("pets".to_string(), true.into());
    seeker
        .preferences
        .insert("rooms".to_string(), Preference::at_least(min_rooms));
    seeker.preferences.insert(
        "district".to_string(),
        Preference::one_of(["old town", "harbor"]),
    );
    seeker
}
