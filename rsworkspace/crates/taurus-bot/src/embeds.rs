//! User-facing embed templates.

use discord_types::colors::{BLURPLE, GREEN, ORANGE, RED};
use discord_types::{Embed, EmbedFooter};

use crate::classifier::FailureCategory;

pub const LOADING_FRAMES: [&str; 4] = ["", " .  ", " . . ", " . . ."];

const ERROR_TITLE: &str = "⚠️ An Error Occurred";

/// Placeholder shown while the model is working.
pub fn loading(frame: usize, avatar_url: Option<&str>, integrator_id: Option<u64>) -> Embed {
    let dots = LOADING_FRAMES[frame % LOADING_FRAMES.len()];
    let mut description = String::from(
        "*TaurusAI may display innacurate/offensive info.*\n\n> *I am powered by Google's Generative AI, [Gemini](https://gemini.google.com)",
    );
    match integrator_id {
        Some(id) => description.push_str(&format!(" and was integrated by <@{id}>.*")),
        None => description.push_str(".*"),
    }

    Embed::new()
        .title(format!("**Loading your response {dots}**"))
        .description(description)
        .footer(EmbedFooter {
            text: "⏳ This may take a while".to_string(),
            icon_url: avatar_url.map(str::to_string),
        })
        .timestamped()
}

/// Red embed for a failed request.
pub fn failure(category: FailureCategory) -> Embed {
    let (title, description) = match category {
        FailureCategory::Safety => (
            ERROR_TITLE,
            "> *The response was blocked due to **SAFETY**.* \n- *Result based on your input. Safety Blocking may not be 100% correct.*",
        ),
        FailureCategory::Empty => (
            ERROR_TITLE,
            "An error occurred while processing your request. Please try again later, or in a few minutes. \n▸ *If this issue persists, please contact the Developers.* \n> - Generated response may be too long. *(Fix this by specifying for the generated response to be smaller, e.g. 10 Lines)*\n> - Token Limit for this minute may have been reached.",
        ),
        FailureCategory::UnsupportedRegion => (
            ERROR_TITLE,
            "> *The user location is not supported for Gemini API use. Please contact the Developers.*",
        ),
        FailureCategory::RateLimited => (
            ERROR_TITLE,
            "There are a lot of requests at the moment. Please try again later, or in a few minutes. \n▸ *If this issue persists after a few minutes, please contact the Developers.* \n - *We are aware of these issues and apologize for the inconvenience.* \n> - Token Limit for this minute has been reached.",
        ),
        FailureCategory::UpstreamInternal => (
            ERROR_TITLE,
            "An error occurred while processing your request. This error originated from Google's side, not ours.  \n▸ *If this issue persists, please contact the Developers.* \n> - Please retry and make another request.",
        ),
        FailureCategory::InvalidCredential => (
            "⚠️ Invalid API Key",
            "> **The API Key for Gemini is invalid or not provided.**",
        ),
        FailureCategory::Unknown => (
            ERROR_TITLE,
            "An unknown error occurred while processing your request. Please try again later, or in a few minutes. \n▸ *If this issue persists, please contact the Developers.*\n> - Token Limit for this minute may have been reached.",
        ),
    };
    Embed::new().title(title).description(description).color(RED)
}

/// One frame of the rate-limit countdown.
pub fn countdown(seconds_left: u32) -> Embed {
    failure(FailureCategory::RateLimited)
        .footer_text(format!("⏱️ Retrying request in ({seconds_left})"))
}

pub fn mention_rejected() -> Embed {
    Embed::new()
        .title("⚠️ Response Cannot Be Sent")
        .description(
            "> *The generated message contains a mention of a Role or different User to the one that sent the original message/command.*",
        )
        .color(RED)
}

pub fn thread_deleted_notice() -> Embed {
    Embed::new()
        .footer_text(
            "A message has been deleted/is not accessible in the reply thread, Taurus does not know the past reply thread history.",
        )
        .color(ORANGE)
}

pub fn slash_command_notice() -> Embed {
    Embed::new()
        .footer_text(
            "Reply thread history not accessible, utilise history by mentioning me to chat instead.",
        )
        .color(ORANGE)
}

pub fn owner_only() -> Embed {
    Embed::new()
        .description("**⚠️ This is limited to Developers Only!**")
        .color(RED)
}

/// A registered chat-input command, as listed by `/help`.
#[derive(Debug, Clone, PartialEq)]
pub struct HelpEntry {
    pub name: String,
    pub id: u64,
    pub description: String,
}

pub fn help(entries: &[HelpEntry]) -> Embed {
    let listing = entries
        .iter()
        .map(|e| format!("**</{}:{}>**: {}", e.name, e.id, e.description))
        .collect::<Vec<_>>()
        .join("\n");
    Embed::new()
        .title("⚙️ Available commands")
        .description(listing)
        .color(BLURPLE)
}

/// Confirmation for owner commands.
pub fn settings_updated(description: impl Into<String>) -> Embed {
    Embed::new()
        .title("✅ Settings updated")
        .description(description)
        .color(GREEN)
}

pub fn settings_error(description: impl Into<String>) -> Embed {
    Embed::new()
        .title(ERROR_TITLE)
        .description(description)
        .color(RED)
}
