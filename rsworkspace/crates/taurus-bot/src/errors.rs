//! Discord-specific error handling for the bot.
//!
//! Reduces serenity errors to a [`DiscordApiFailure`] and logs them at a
//! level that matches how actionable they are.

use discord_types::{DiscordApiFailure, ErrorCategory};
use serenity::http::HttpError;
use tracing::{debug, error, warn};

/// Reduce a serenity error to the Discord code and status behind it.
pub fn api_failure(err: &serenity::Error) -> DiscordApiFailure {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            DiscordApiFailure::from_response(
                resp.error.code as u32,
                resp.status_code.as_u16(),
                resp.error.message.clone(),
            )
        }
        other => DiscordApiFailure::network(other.to_string()),
    }
}

/// Log a serenity error at the appropriate level.
///
/// - Permission and input problems → `error!` (needs a fix, not a retry)
/// - Rate limits and network errors → `warn!`
/// - Gone resources → `debug!` (users delete messages all the time)
pub fn log_error(context: &str, err: &serenity::Error) {
    let failure = api_failure(err);
    match failure.code.category() {
        ErrorCategory::PermissionDenied | ErrorCategory::InvalidInput => {
            error!("{} [{:?}]: {}", context, failure.code, failure);
        }
        ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Unknown => {
            warn!("{} [{:?}]: {}", context, failure.code, failure);
        }
        ErrorCategory::NotFound => {
            debug!("{} [{:?}]: {}", context, failure.code, failure);
        }
    }
}
