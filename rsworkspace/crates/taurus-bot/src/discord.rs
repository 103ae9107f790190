//! serenity adapters: model conversion plus the message store and sinks the
//! core talks to.

use std::sync::Arc;

use async_trait::async_trait;
use discord_types::{DiscordMessage, DiscordUser, Embed, EmbedFooter, ErrorCategory};
use serenity::builder::{CreateEmbed, CreateEmbedFooter, EditInteractionResponse, EditMessage};
use serenity::http::Http;
use serenity::model::channel::Message as SerenityMessage;
use serenity::model::id::{ChannelId, MessageId};
use serenity::model::user::User as SerenityUser;
use serenity::model::Timestamp;
use tracing::debug;

use crate::errors::api_failure;
use crate::sink::{MessageUpdate, ResponseSink, SinkError};
use crate::thread::{FetchError, MessageStore};

// ── Conversion helpers ─────────────────────────────────────────────────────

pub fn convert_user(user: &SerenityUser) -> DiscordUser {
    DiscordUser {
        id: user.id.get(),
        username: user.name.clone(),
        discriminator: user.discriminator.map(|d| d.get()),
        global_name: user.global_name.clone(),
        bot: user.bot,
    }
}

pub fn convert_message(msg: &SerenityMessage) -> DiscordMessage {
    let embeds = msg
        .embeds
        .iter()
        .map(|e| Embed {
            title: e.title.clone(),
            description: e.description.clone(),
            color: e.colour.map(|c| c.0),
            footer: e.footer.as_ref().map(|f| EmbedFooter {
                text: f.text.clone(),
                icon_url: f.icon_url.clone(),
            }),
            timestamped: e.timestamp.is_some(),
        })
        .collect();

    let referenced_message_id = msg
        .message_reference
        .as_ref()
        .and_then(|r| r.message_id)
        .or_else(|| msg.referenced_message.as_ref().map(|r| r.id))
        .map(|id| id.get());

    DiscordMessage {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author: convert_user(&msg.author),
        content: msg.content.clone(),
        embeds,
        referenced_message_id,
    }
}

pub fn to_create_embed(embed: &Embed) -> CreateEmbed {
    let mut out = CreateEmbed::new();
    if let Some(title) = &embed.title {
        out = out.title(title);
    }
    if let Some(description) = &embed.description {
        out = out.description(description);
    }
    if let Some(color) = embed.color {
        out = out.colour(color);
    }
    if let Some(footer) = &embed.footer {
        let mut f = CreateEmbedFooter::new(&footer.text);
        if let Some(icon) = &footer.icon_url {
            f = f.icon_url(icon);
        }
        out = out.footer(f);
    }
    if embed.timestamped {
        out = out.timestamp(Timestamp::now());
    }
    out
}

fn to_create_embeds(embeds: &[Embed]) -> Vec<CreateEmbed> {
    embeds.iter().map(to_create_embed).collect()
}

// ── Message store ──────────────────────────────────────────────────────────

/// Reads messages of a single channel over REST.
pub struct ChannelMessages {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelMessages {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl MessageStore for ChannelMessages {
    async fn fetch(&self, message_id: u64) -> Result<DiscordMessage, FetchError> {
        match self
            .http
            .get_message(self.channel_id, MessageId::new(message_id))
            .await
        {
            Ok(msg) => Ok(convert_message(&msg)),
            Err(e) => {
                let failure = api_failure(&e);
                debug!(message_id, error = %failure, "Failed to fetch message");
                if failure.code.is_inaccessible()
                    || failure.code.category() == ErrorCategory::NotFound
                {
                    Err(FetchError::NotFound(message_id))
                } else {
                    Err(FetchError::Api(failure))
                }
            }
        }
    }
}

// ── Sinks ──────────────────────────────────────────────────────────────────

/// A placeholder message sent by the bot into a channel.
pub struct MessageSink {
    http: Arc<Http>,
    channel_id: ChannelId,
    message_id: MessageId,
}

impl MessageSink {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            http,
            channel_id,
            message_id,
        }
    }
}

#[async_trait]
impl ResponseSink for MessageSink {
    async fn edit(&self, update: MessageUpdate) -> Result<(), SinkError> {
        let mut builder = EditMessage::new().embeds(to_create_embeds(&update.embeds));
        if let Some(content) = update.content {
            builder = builder.content(content);
        }
        self.channel_id
            .edit_message(&*self.http, self.message_id, builder)
            .await
            .map(|_| ())
            .map_err(|e| SinkError::Api(api_failure(&e)))
    }
}

/// The original response of an interaction, addressed by its token.
pub struct InteractionSink {
    http: Arc<Http>,
    token: String,
}

impl InteractionSink {
    pub fn new(http: Arc<Http>, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
        }
    }
}

#[async_trait]
impl ResponseSink for InteractionSink {
    async fn edit(&self, update: MessageUpdate) -> Result<(), SinkError> {
        let mut builder = EditInteractionResponse::new().embeds(to_create_embeds(&update.embeds));
        if let Some(content) = update.content {
            builder = builder.content(content);
        }
        self.http
            .edit_original_interaction_response(&self.token, &builder, Vec::new())
            .await
            .map(|_| ())
            .map_err(|e| SinkError::Api(api_failure(&e)))
    }
}
