//! Reply-chain reconstruction.
//!
//! Discord has no conversation id, so the history for a reply is rebuilt by
//! following `message_reference` pointers backwards from the newest message
//! until a thread root is reached. Footer tags on the bot's own replies
//! (see [`discord_types::footer`]) mark where a thread started and, for
//! context-menu answers, carry the prompt that produced them.

#[cfg(test)]
#[path = "thread_tests.rs"]
mod thread_tests;

use std::sync::LazyLock;

use async_trait::async_trait;
use discord_types::footer::prompt_from_response_footer;
use discord_types::{DiscordApiFailure, DiscordMessage, FooterTag};
use llm_types::{ConversationThread, Turn};
use regex::Regex;
use tracing::{debug, warn};

/// Upper bound on reply hops followed for one request.
pub const MAX_WALK_DEPTH: usize = 50;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)",
    )
    .expect("valid URL regex")
});

static LEADING_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<@\d+>\s*").expect("valid mention regex"));

/// Why the walk stopped before it reached a natural root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationReason {
    #[default]
    None,
    /// A message in the chain is gone, unreadable, or not part of a bot thread.
    ThreadDeleted,
    /// The request came from a slash command, which never has history.
    SlashCommandOrigin,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Deleted, or the bot can no longer read it.
    #[error("message {0} not found")]
    NotFound(u64),

    #[error("failed to fetch message: {0}")]
    Api(DiscordApiFailure),
}

impl From<DiscordApiFailure> for FetchError {
    fn from(failure: DiscordApiFailure) -> Self {
        FetchError::Api(failure)
    }
}

/// Read access to the messages of one channel.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn fetch(&self, message_id: u64) -> Result<DiscordMessage, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// The leaf's text with a leading mention of the bot removed.
    pub latest_user_text: String,
    /// Prior turns, oldest first. Does not include `latest_user_text`.
    pub turns: ConversationThread,
    pub termination: TerminationReason,
}

/// Walks reply chains for one bot account.
#[derive(Debug, Clone)]
pub struct ThreadWalker {
    bot_id: u64,
    max_depth: usize,
}

impl ThreadWalker {
    pub fn new(bot_id: u64) -> Self {
        Self {
            bot_id,
            max_depth: MAX_WALK_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rebuild the conversation that `leaf` continues.
    ///
    /// Missing or unreadable messages end the walk with
    /// [`TerminationReason::ThreadDeleted`] and no turns. Only fetch failures
    /// that are not "gone" surface as `Err`.
    pub async fn reconstruct(
        &self,
        leaf: &DiscordMessage,
        store: &dyn MessageStore,
    ) -> Result<Reconstruction, FetchError> {
        let latest_user_text = strip_leading_mention(&leaf.content);

        let Some(reference) = leaf.referenced_message_id else {
            return Ok(Reconstruction {
                latest_user_text,
                turns: ConversationThread::new(),
                termination: TerminationReason::None,
            });
        };

        let deleted = |latest_user_text: String| Reconstruction {
            latest_user_text,
            turns: ConversationThread::new(),
            termination: TerminationReason::ThreadDeleted,
        };

        let original = match store.fetch(reference).await {
            Ok(message) => message,
            Err(FetchError::NotFound(id)) => {
                debug!(message_id = id, "Reply target is gone");
                return Ok(deleted(latest_user_text));
            }
            Err(e) => return Err(e),
        };

        if !self.is_conversation_anchor(&original) {
            debug!(message_id = original.id, "Reply target is not a bot conversation");
            return Ok(deleted(latest_user_text));
        }

        let mut turns = ConversationThread::new();
        let mut prefetched = Some(original);
        let mut next = leaf.referenced_message_id;
        let mut at_root = self.is_thread_root(leaf);
        let mut hops = 0;

        while let Some(message_id) = next {
            if at_root {
                break;
            }
            if hops >= self.max_depth {
                warn!(
                    hops,
                    leaf_id = leaf.id,
                    "Reply chain exceeds walk depth; keeping partial history"
                );
                return Ok(Reconstruction {
                    latest_user_text,
                    turns,
                    termination: TerminationReason::ThreadDeleted,
                });
            }
            hops += 1;

            let message = match prefetched.take() {
                Some(message) => message,
                None => match store.fetch(message_id).await {
                    Ok(message) => message,
                    Err(FetchError::NotFound(id)) => {
                        debug!(message_id = id, hops, "Message in reply chain is gone");
                        return Ok(deleted(latest_user_text));
                    }
                    Err(e) => return Err(e),
                },
            };

            if message.author.id == self.bot_id {
                turns.prepend(Turn::model(message.content.as_str()));
                if let Some(prompt) = message.first_footer().and_then(prompt_from_response_footer)
                {
                    turns.prepend(Turn::user(prompt));
                }
            } else {
                turns.prepend(Turn::user(strip_leading_mention(&message.content)));
            }

            at_root = self.is_thread_root(&message);
            next = message.referenced_message_id;
        }

        debug!(turns = turns.len(), hops, "Reconstructed reply thread");
        Ok(Reconstruction {
            latest_user_text,
            turns,
            termination: TerminationReason::None,
        })
    }

    /// A reply target counts as part of a bot conversation when the bot wrote
    /// it and it is either plain text, tagged with a known footer, or carries
    /// a link.
    fn is_conversation_anchor(&self, message: &DiscordMessage) -> bool {
        if message.author.id != self.bot_id {
            return false;
        }
        message.embeds.is_empty()
            || message.first_footer().and_then(FooterTag::detect).is_some()
            || contains_url(&message.content)
    }

    /// The first bot message with an embed (and no link) is where a thread starts.
    fn is_thread_root(&self, message: &DiscordMessage) -> bool {
        message.author.id == self.bot_id
            && !message.embeds.is_empty()
            && !contains_url(&message.content)
    }
}

pub fn contains_url(text: &str) -> bool {
    URL_RE.is_match(text)
}

/// Remove a `<@id>` token that opens the message, with the whitespace around it.
pub fn strip_leading_mention(text: &str) -> String {
    LEADING_MENTION_RE.replace(text, "").into_owned()
}
