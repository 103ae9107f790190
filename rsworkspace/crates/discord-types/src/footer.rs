//! Footer tags written under the bot's own replies.
//!
//! Discord keeps no conversation id, so the first embed footer on a bot reply
//! is the only record of how that reply came to be. Each tag is a fixed
//! prefix; the `Response to message by` tag additionally carries the user's
//! original prompt on its third line:
//!
//! ```text
//! Response to message by alice#0001
//!
//! what is the capital of France?
//! ```

/// Known footer prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterTag {
    /// Reply produced from a context-menu invocation.
    ResponseTo,
    /// Reply whose thread history could not be read.
    MessageDeleted,
    /// Reply produced from a slash command (no history available).
    ReplyThreadHistory,
}

impl FooterTag {
    pub const ALL: [FooterTag; 3] = [
        FooterTag::ResponseTo,
        FooterTag::MessageDeleted,
        FooterTag::ReplyThreadHistory,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            FooterTag::ResponseTo => "Response to message by",
            FooterTag::MessageDeleted => "A message has been deleted",
            FooterTag::ReplyThreadHistory => "Reply thread history",
        }
    }

    /// Identify the tag a footer text starts with.
    pub fn detect(text: &str) -> Option<FooterTag> {
        Self::ALL.into_iter().find(|tag| text.starts_with(tag.prefix()))
    }
}

/// Build a `Response to message by` footer for `author_tag` and `prompt`.
pub fn response_footer(author_tag: &str, prompt: &str) -> String {
    format!("{} {}\n\n{}", FooterTag::ResponseTo.prefix(), author_tag, prompt)
}

/// Recover the prompt from a `Response to message by` footer.
///
/// Returns `None` for any other footer, or when the third line is missing.
pub fn prompt_from_response_footer(text: &str) -> Option<&str> {
    if FooterTag::detect(text) != Some(FooterTag::ResponseTo) {
        return None;
    }
    text.split('\n').nth(2)
}
