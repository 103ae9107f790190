//! Core Discord domain types

use serde::{Deserialize, Serialize};

/// Discord user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscordUser {
    pub id: u64,
    pub username: String,
    /// Legacy four-digit discriminator; `None` for migrated usernames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    pub bot: bool,
}

impl DiscordUser {
    /// `name#1234` for legacy accounts, plain `name` otherwise.
    pub fn tag(&self) -> String {
        match self.discriminator {
            Some(d) if d != 0 => format!("{}#{:04}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

/// Embed footer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl EmbedFooter {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            icon_url: None,
        }
    }
}

/// Message embed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// Stamp the embed with the time it is sent.
    #[serde(default)]
    pub timestamped: bool,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn footer(mut self, footer: EmbedFooter) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn footer_text(self, text: impl Into<String>) -> Self {
        self.footer(EmbedFooter::new(text))
    }

    pub fn timestamped(mut self) -> Self {
        self.timestamped = true;
        self
    }

    /// Footer text, if the embed has a footer.
    pub fn footer_str(&self) -> Option<&str> {
        self.footer.as_ref().map(|f| f.text.as_str())
    }
}

/// Discord message, as read back from a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscordMessage {
    pub id: u64,
    pub channel_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub author: DiscordUser,
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    /// Id of the message this one replies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_message_id: Option<u64>,
}

impl DiscordMessage {
    /// Footer text of the first embed, which is where the bot writes its markers.
    pub fn first_footer(&self) -> Option<&str> {
        self.embeds.first().and_then(Embed::footer_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(discriminator: Option<u16>) -> DiscordUser {
        DiscordUser {
            id: 1,
            username: "alice".to_string(),
            discriminator,
            global_name: None,
            bot: false,
        }
    }

    #[test]
    fn test_tag_legacy_discriminator() {
        assert_eq!(user(Some(42)).tag(), "alice#0042");
    }

    #[test]
    fn test_tag_migrated_username() {
        assert_eq!(user(None).tag(), "alice");
        assert_eq!(user(Some(0)).tag(), "alice");
    }

    #[test]
    fn test_first_footer() {
        let msg = DiscordMessage {
            id: 10,
            channel_id: 20,
            guild_id: None,
            author: user(None),
            content: String::new(),
            embeds: vec![
                Embed::new().footer_text("first"),
                Embed::new().footer_text("second"),
            ],
            referenced_message_id: None,
        };
        assert_eq!(msg.first_footer(), Some("first"));
    }

    #[test]
    fn test_first_footer_missing() {
        let msg = DiscordMessage {
            id: 10,
            channel_id: 20,
            guild_id: None,
            author: user(None),
            content: String::new(),
            embeds: vec![Embed::new().title("no footer")],
            referenced_message_id: None,
        };
        assert_eq!(msg.first_footer(), None);
    }

    #[test]
    fn test_embed_serde_skips_empty_fields() {
        let embed = Embed::new().title("hi").color(0x123456);
        let json = serde_json::to_string(&embed).unwrap();
        assert!(!json.contains("footer"));
        assert!(json.contains("\"color\":1193046"));
    }
}
