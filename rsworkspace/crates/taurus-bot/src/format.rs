//! Turns raw model output into a Discord message edit.
//!
//! Applies Discord's 2000 character content limit, refuses answers that
//! would ping anyone other than the requester, and attaches the footer
//! annotations that later let the thread walker recognise this reply.

#[cfg(test)]
#[path = "format_tests.rs"]
mod format_tests;

use std::sync::LazyLock;

use discord_types::colors::BLUE;
use discord_types::footer::response_footer;
use discord_types::Embed;
use regex::Regex;

use crate::embeds;
use crate::thread::TerminationReason;

/// Discord's message content limit, in characters.
pub const CONTENT_LIMIT: usize = 2000;

/// Longest footer text written by the bot.
pub const FOOTER_LIMIT: usize = 2000;

pub const TRUNCATION_NOTICE: &str =
    "... \n\n*Response was cut short due to Discords character limit of 2000*";

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([!&]?)(\d+)>").expect("valid mention regex"));

/// The message a context-menu request was made on.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextTarget {
    pub author_tag: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormatOutcome {
    Ready { content: String, embeds: Vec<Embed> },
    /// The answer mentions someone else; show `embed` instead.
    Rejected { embed: Embed },
}

pub fn format_response(
    raw: &str,
    allowed_mention_id: u64,
    context: Option<&ContextTarget>,
    termination: TerminationReason,
) -> FormatOutcome {
    let content = truncate_content(raw);

    if has_foreign_mention(&content, allowed_mention_id) {
        return FormatOutcome::Rejected {
            embed: embeds::mention_rejected(),
        };
    }

    let mut attached = Vec::new();
    if let Some(target) = context {
        attached.push(context_embed(target));
    }
    match termination {
        TerminationReason::ThreadDeleted => attached.push(embeds::thread_deleted_notice()),
        TerminationReason::SlashCommandOrigin => attached.push(embeds::slash_command_notice()),
        TerminationReason::None => {}
    }

    FormatOutcome::Ready {
        content,
        embeds: attached,
    }
}

/// Cut `raw` to fit in one message, ending with [`TRUNCATION_NOTICE`] when cut.
pub fn truncate_content(raw: &str) -> String {
    if raw.chars().count() <= CONTENT_LIMIT {
        return raw.to_string();
    }
    let keep = CONTENT_LIMIT - TRUNCATION_NOTICE.chars().count();
    let mut out: String = raw.chars().take(keep).collect();
    out.push_str(TRUNCATION_NOTICE);
    out
}

/// True when `text` mentions a role or any user other than `allowed_id`.
pub fn has_foreign_mention(text: &str, allowed_id: u64) -> bool {
    MENTION_RE.captures_iter(text).any(|caps| {
        let is_role = &caps[1] == "&";
        let same_user = caps[2].parse::<u64>().is_ok_and(|id| id == allowed_id);
        is_role || !same_user
    })
}

fn context_embed(target: &ContextTarget) -> Embed {
    let text = response_footer(&target.author_tag, &target.content);
    Embed::new().footer_text(truncate_footer(&text)).color(BLUE)
}

fn truncate_footer(text: &str) -> String {
    if text.chars().count() <= FOOTER_LIMIT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(FOOTER_LIMIT - 3).collect();
    out.push_str("...");
    out
}
