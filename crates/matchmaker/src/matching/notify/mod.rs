//! Dual announcement of a recorded match over a shared broadcast topic.
//!
//! Fan-out runs strictly after the match is stored. Its failures are logged and reported as a
//! [`NotificationOutcome`], never as an error, so a lost notification cannot undo a match.

mod announcer;
mod channel;
mod local;

pub use announcer::{AnnouncementRequest, Announcer, AnnouncerError, TemplateAnnouncer};
pub use channel::{
    BroadcastChannel, PublishError, SubscribeError, SubscribedTopic, SubscriptionAck,
    SubscriptionState, TopicHandshake,
};
pub use local::{LocalBroadcast, RecipientListener};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Entity, EntityId, Match, MatchId, NotificationPayload, PoolTag, RankedEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcements {
    pub for_side_a: String,
    pub for_side_b: String,
}

/// Single broadcast message addressed to both sides of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub event_kind: EventKind,
    pub match_id: MatchId,
    pub from_entity_id: EntityId,
    pub to_entity_id: EntityId,
    pub score: f64,
    pub announcements: Announcements,
    pub payloads: Vec<NotificationPayload>,
}

impl MatchEvent {
    pub fn new_match(record: &Match, side_a: NotificationPayload, side_b: NotificationPayload) -> Self {
        Self {
            event_kind: EventKind::NewMatch,
            match_id: record.id.clone(),
            from_entity_id: record.from_entity_id.clone(),
            to_entity_id: record.to_entity_id.clone(),
            score: record.score,
            announcements: Announcements {
                for_side_a: side_a.announcement.clone(),
                for_side_b: side_b.announcement.clone(),
            },
            payloads: vec![side_a, side_b],
        }
    }

    pub fn payload_for(&self, recipient: &EntityId) -> Option<&NotificationPayload> {
        self.payloads
            .iter()
            .find(|payload| &payload.recipient_entity_id == recipient)
    }

    pub fn recipients(&self) -> Vec<EntityId> {
        self.payloads
            .iter()
            .map(|payload| payload.recipient_entity_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutStage {
    Subscribe,
    Publish,
}

/// What happened to the announcement of a recorded match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Delivered {
        topic: String,
        recipients: Vec<EntityId>,
    },
    Failed {
        stage: FanoutStage,
        reason: String,
    },
}

impl NotificationOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotificationOutcome::Delivered { .. })
    }
}

/// Builds both sides' payloads and publishes them with the subscribe-before-send handshake.
pub struct NotificationFanout<C> {
    channel: Arc<C>,
    announcer: Arc<dyn Announcer>,
    topic: String,
    timeout: Duration,
}

impl<C> NotificationFanout<C>
where
    C: BroadcastChannel + 'static,
{
    pub fn new(
        channel: Arc<C>,
        announcer: Arc<dyn Announcer>,
        topic: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            announcer,
            topic: topic.into(),
            timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payloads for the pool-A side and the pool-B side of `record`, in that order.
    pub async fn prepare(
        &self,
        record: &Match,
        arrival: &Entity,
        counterpart: &Entity,
        ranked: &[RankedEntry],
    ) -> (NotificationPayload, NotificationPayload) {
        let (side_a, side_b) = match arrival.pool {
            PoolTag::A => (arrival, counterpart),
            PoolTag::B => (counterpart, arrival),
        };

        let others: Vec<RankedEntry> = ranked
            .iter()
            .filter(|entry| !record.involves(&entry.id))
            .cloned()
            .collect();

        let (text_a, text_b) = futures::join!(
            self.announce(side_a, side_b, record),
            self.announce(side_b, side_a, record)
        );

        let payload = |recipient: &Entity, counterpart: &Entity, announcement: String| {
            NotificationPayload {
                recipient_entity_id: recipient.id.clone(),
                counterpart_entity_id: counterpart.id.clone(),
                score: record.score,
                announcement,
                other_candidates: others.clone(),
            }
        };

        (
            payload(side_a, side_b, text_a),
            payload(side_b, side_a, text_b),
        )
    }

    /// Subscribe, await confirmation, send one event, then leave the topic.
    pub async fn publish(
        &self,
        record: &Match,
        side_a: NotificationPayload,
        side_b: NotificationPayload,
    ) -> NotificationOutcome {
        let handshake = TopicHandshake::new(self.channel.as_ref(), &self.topic, self.timeout);
        let session = match handshake.subscribe().await {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    match_id = %record.id,
                    topic = %self.topic,
                    error = %err,
                    "match announcement dropped: subscribe failed"
                );
                return NotificationOutcome::Failed {
                    stage: FanoutStage::Subscribe,
                    reason: err.to_string(),
                };
            }
        };

        let event = MatchEvent::new_match(record, side_a, side_b);
        let sent = session.send(&event).await;
        session.close().await;

        match sent {
            Ok(()) => {
                let recipients = event.recipients();
                info!(
                    match_id = %record.id,
                    topic = %self.topic,
                    "match announcement published"
                );
                NotificationOutcome::Delivered {
                    topic: self.topic.clone(),
                    recipients,
                }
            }
            Err(err) => {
                warn!(
                    match_id = %record.id,
                    topic = %self.topic,
                    error = %err,
                    "match announcement dropped: send failed"
                );
                NotificationOutcome::Failed {
                    stage: FanoutStage::Publish,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn announce(&self, recipient: &Entity, counterpart: &Entity, record: &Match) -> String {
        let request = AnnouncementRequest {
            recipient,
            counterpart,
            record,
        };

        let result =
            match tokio::time::timeout(self.timeout, self.announcer.announce(request)).await {
                Ok(result) => result,
                Err(_) => Err(AnnouncerError::Timeout(self.timeout)),
            };

        result.unwrap_or_else(|err| {
            warn!(
                recipient = %recipient.id,
                error = %err,
                "announcer failed; using template text"
            );
            TemplateAnnouncer::render(request)
        })
    }
}
