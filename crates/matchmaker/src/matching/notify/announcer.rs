use std::time::Duration;

use async_trait::async_trait;

use crate::matching::domain::{Entity, Match};
use crate::matching::evaluation::SatisfactionResult;

/// Everything a text generator needs to phrase one side of a match.
#[derive(Debug, Clone, Copy)]
pub struct AnnouncementRequest<'a> {
    pub recipient: &'a Entity,
    pub counterpart: &'a Entity,
    pub record: &'a Match,
}

impl AnnouncementRequest<'_> {
    /// How well the counterpart met the recipient's own preferences.
    pub fn recipient_satisfaction(&self) -> &SatisfactionResult {
        if self.record.from_entity_id == self.recipient.id {
            &self.record.forward
        } else {
            &self.record.reverse
        }
    }
}

/// Text-generation collaborator: breakdown in, prose out. Display only.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, request: AnnouncementRequest<'_>) -> Result<String, AnnouncerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnouncerError {
    #[error("text generation unavailable: {0}")]
    Unavailable(String),
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Deterministic announcer used when no external text generator is configured, and as the
/// fallback when one fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAnnouncer;

impl TemplateAnnouncer {
    pub fn render(request: AnnouncementRequest<'_>) -> String {
        let mut text = format!(
            "{}, you have been matched with {} (score {:.2}).",
            request.recipient.name(),
            request.counterpart.name(),
            request.record.score
        );

        let satisfaction = request.recipient_satisfaction();
        if satisfaction.is_vacuous() {
            text.push_str(" You did not state any preferences this match could be checked against.");
        } else if satisfaction.violated.is_empty() {
            text.push_str(&format!(
                " Every preference we could check was met: {}.",
                satisfaction.satisfied.join(", ")
            ));
        } else {
            if !satisfaction.satisfied.is_empty() {
                text.push_str(&format!(" Met: {}.", satisfaction.satisfied.join(", ")));
            }
            let misses: Vec<String> = satisfaction
                .violated
                .iter()
                .map(|violation| violation.summary())
                .collect();
            text.push_str(&format!(" Not met: {}.", misses.join("; ")));
        }

        text
    }
}

#[async_trait]
impl Announcer for TemplateAnnouncer {
    async fn announce(&self, request: AnnouncementRequest<'_>) -> Result<String, AnnouncerError> {
        Ok(Self::render(request))
    }
}
