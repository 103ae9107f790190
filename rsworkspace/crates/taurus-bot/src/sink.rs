//! The placeholder message a request keeps editing until it is answered.

use async_trait::async_trait;
use discord_types::{DiscordApiFailure, Embed};

/// One edit of the placeholder. `content: None` leaves the text untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageUpdate {
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

impl MessageUpdate {
    pub fn embed(embed: Embed) -> Self {
        Self {
            content: None,
            embeds: vec![embed],
        }
    }

    pub fn answer(content: String, embeds: Vec<Embed>) -> Self {
        Self {
            content: Some(content),
            embeds,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Discord rejected the edit: {0}")]
    Api(DiscordApiFailure),
}

impl SinkError {
    pub fn failure(&self) -> &DiscordApiFailure {
        match self {
            SinkError::Api(f) => f,
        }
    }
}

#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn edit(&self, update: MessageUpdate) -> Result<(), SinkError>;
}
