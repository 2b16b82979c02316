use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::MatchEvent;

/// Shared broadcast topic. Every subscriber of a topic receives every event sent to it.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    /// Join `topic`, resolving only once the topic confirms the subscription.
    async fn subscribe(&self, topic: &str) -> Result<SubscriptionAck, SubscribeError>;
    async fn send(&self, topic: &str, event: &MatchEvent) -> Result<(), PublishError>;
    async fn unsubscribe(&self, topic: &str);
}

/// Confirmation returned by the topic for a completed subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionAck {
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    #[error("subscription rejected: {0}")]
    Rejected(String),
    #[error("subscription not confirmed within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("publisher is not subscribed to '{0}'")]
    NotSubscribed(String),
    #[error("broadcast transport failed: {0}")]
    Transport(String),
    #[error("send not acknowledged within {0:?}")]
    Timeout(Duration),
}

/// Publisher side of a topic before the subscribe handshake has completed.
///
/// Only [`TopicHandshake::subscribe`] produces a [`SubscribedTopic`], and only a
/// `SubscribedTopic` can send, so an event can never go out ahead of the confirmation.
pub struct TopicHandshake<'a, C: ?Sized> {
    channel: &'a C,
    topic: &'a str,
    timeout: Duration,
}

impl<'a, C> TopicHandshake<'a, C>
where
    C: BroadcastChannel + ?Sized,
{
    pub fn new(channel: &'a C, topic: &'a str, timeout: Duration) -> Self {
        Self {
            channel,
            topic,
            timeout,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::Unsubscribed
    }

    pub async fn subscribe(self) -> Result<SubscribedTopic<'a, C>, SubscribeError> {
        let ack = match tokio::time::timeout(self.timeout, self.channel.subscribe(self.topic)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(SubscribeError::Timeout(self.timeout)),
        };

        if ack.topic != self.topic {
            return Err(SubscribeError::Rejected(format!(
                "confirmation was for '{}', expected '{}'",
                ack.topic, self.topic
            )));
        }

        debug!(topic = self.topic, "broadcast subscription confirmed");
        Ok(SubscribedTopic {
            channel: self.channel,
            topic: self.topic,
            timeout: self.timeout,
        })
    }
}

/// Publisher side of a topic after the subscription was confirmed.
pub struct SubscribedTopic<'a, C: ?Sized> {
    channel: &'a C,
    topic: &'a str,
    timeout: Duration,
}

impl<'a, C> SubscribedTopic<'a, C>
where
    C: BroadcastChannel + ?Sized,
{
    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::Subscribed
    }

    pub async fn send(&self, event: &MatchEvent) -> Result<(), PublishError> {
        match tokio::time::timeout(self.timeout, self.channel.send(self.topic, event)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.timeout)),
        }
    }

    pub async fn close(self) {
        self.channel.unsubscribe(self.topic).await;
    }
}
