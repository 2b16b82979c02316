use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::channel::{BroadcastChannel, PublishError, SubscribeError, SubscriptionAck};
use super::MatchEvent;
use crate::matching::domain::{EntityId, NotificationPayload};

const DEFAULT_CAPACITY: usize = 256;

struct Topic {
    sender: broadcast::Sender<MatchEvent>,
    // One receiver per live publisher subscription; dropped on unsubscribe.
    publishers: Vec<broadcast::Receiver<MatchEvent>>,
}

/// In-process broadcast topics on top of `tokio::sync::broadcast`.
pub struct LocalBroadcast {
    capacity: usize,
    topics: Mutex<HashMap<String, Topic>>,
}

impl Default for LocalBroadcast {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LocalBroadcast {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Join `topic` as a consumer. Only events sent after this call are observed.
    pub fn listen(&self, topic: &str) -> broadcast::Receiver<MatchEvent> {
        let mut topics = self.topics.lock().expect("topics mutex poisoned");
        self.topic_entry(&mut topics, topic).sender.subscribe()
    }

    /// Join `topic` as a consumer that only yields payloads addressed to `recipient`.
    pub fn listen_for(&self, topic: &str, recipient: EntityId) -> RecipientListener {
        RecipientListener {
            receiver: self.listen(topic),
            recipient,
        }
    }

    pub fn publisher_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().expect("topics mutex poisoned");
        topics
            .get(topic)
            .map(|entry| entry.publishers.len())
            .unwrap_or(0)
    }

    fn topic_entry<'m>(
        &self,
        topics: &'m mut HashMap<String, Topic>,
        topic: &str,
    ) -> &'m mut Topic {
        topics.entry(topic.to_string()).or_insert_with(|| Topic {
            sender: broadcast::channel(self.capacity).0,
            publishers: Vec::new(),
        })
    }
}

#[async_trait]
impl BroadcastChannel for LocalBroadcast {
    async fn subscribe(&self, topic: &str) -> Result<SubscriptionAck, SubscribeError> {
        let mut topics = self.topics.lock().expect("topics mutex poisoned");
        let entry = self.topic_entry(&mut topics, topic);
        let receiver = entry.sender.subscribe();
        entry.publishers.push(receiver);
        Ok(SubscriptionAck {
            topic: topic.to_string(),
        })
    }

    async fn send(&self, topic: &str, event: &MatchEvent) -> Result<(), PublishError> {
        let topics = self.topics.lock().expect("topics mutex poisoned");
        let entry = match topics.get(topic) {
            Some(entry) if !entry.publishers.is_empty() => entry,
            _ => return Err(PublishError::NotSubscribed(topic.to_string())),
        };

        entry
            .sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| PublishError::Transport(format!("topic '{topic}' has no receivers")))
    }

    async fn unsubscribe(&self, topic: &str) {
        let mut topics = self.topics.lock().expect("topics mutex poisoned");
        if let Some(entry) = topics.get_mut(topic) {
            entry.publishers.pop();
        }
    }
}

/// Consumer-side filter over a topic: yields only payloads addressed to one recipient.
pub struct RecipientListener {
    receiver: broadcast::Receiver<MatchEvent>,
    recipient: EntityId,
}

impl RecipientListener {
    pub fn recipient(&self) -> &EntityId {
        &self.recipient
    }

    /// Wait for the next payload addressed to this recipient. `None` once the topic closes.
    pub async fn next(&mut self) -> Option<NotificationPayload> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(payload) = event.payload_for(&self.recipient) {
                        return Some(payload.clone());
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`RecipientListener::next`].
    pub fn try_next(&mut self) -> Option<NotificationPayload> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Some(payload) = event.payload_for(&self.recipient) {
                        return Some(payload.clone());
                    }
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
