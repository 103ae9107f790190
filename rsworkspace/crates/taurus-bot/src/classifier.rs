//! Maps a failed request to what the user sees and whether to try again.
//!
//! Exact message matches win over HTTP status: the safety and empty-answer
//! markers are checked first, then the status code.

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod classifier_tests;

use std::time::Duration;

use discord_types::{DiscordApiFailure, DiscordErrorCode, Embed};
use llm_gemini::{GeminiError, EMPTY_RESPONSE, SAFETY_BLOCKED};
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::embeds;
use crate::sink::{MessageUpdate, ResponseSink, SinkError};

pub const COUNTDOWN_TICKS: u32 = 5;
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// The parts of a failure the classifier looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSignal {
    pub message: String,
    pub status: Option<u16>,
}

impl From<&GeminiError> for FailureSignal {
    fn from(err: &GeminiError) -> Self {
        Self {
            message: err.to_string(),
            status: err.status(),
        }
    }
}

impl From<&DiscordApiFailure> for FailureSignal {
    fn from(failure: &DiscordApiFailure) -> Self {
        if failure.code == DiscordErrorCode::CannotSendEmptyMessage {
            return Self {
                message: EMPTY_RESPONSE.to_string(),
                status: None,
            };
        }
        // Discord HTTP statuses are not Gemini statuses.
        Self {
            message: failure.to_string(),
            status: None,
        }
    }
}

impl From<&SinkError> for FailureSignal {
    fn from(err: &SinkError) -> Self {
        Self::from(err.failure())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    Safety,
    Empty,
    UnsupportedRegion,
    RateLimited,
    UpstreamInternal,
    InvalidCredential,
    Unknown,
}

pub fn category_of(signal: &FailureSignal) -> FailureCategory {
    match signal.message.as_str() {
        SAFETY_BLOCKED => return FailureCategory::Safety,
        EMPTY_RESPONSE => return FailureCategory::Empty,
        _ => {}
    }
    match signal.status {
        Some(400) => FailureCategory::UnsupportedRegion,
        Some(429) => FailureCategory::RateLimited,
        Some(500) => FailureCategory::UpstreamInternal,
        Some(403) => FailureCategory::InvalidCredential,
        _ => FailureCategory::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDirective {
    None,
    RetrySameModel,
    RetryWithModel(String),
}

impl RetryDirective {
    pub fn is_retry(&self) -> bool {
        !matches!(self, RetryDirective::None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: FailureCategory,
    /// What the placeholder should show if the request is abandoned here.
    pub display: Embed,
    pub retry: RetryDirective,
}

/// The two models that stand in for each other on rate limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPair {
    pub primary: String,
    pub fallback: String,
}

impl ModelPair {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    /// The other member of the pair; anything that is not the primary maps to it.
    pub fn fallback_for(&self, current: &str) -> &str {
        if current == self.primary {
            &self.fallback
        } else {
            &self.primary
        }
    }
}

/// Per-request state the classifier needs to pick a retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryState<'a> {
    pub current_model: &'a str,
    pub fallback_enabled: bool,
    /// The model switch has already been spent on this request.
    pub fallback_used: bool,
    /// Model calls the request may still make after this one.
    pub attempts_left: u32,
}

pub struct ErrorClassifier<C: Clock> {
    clock: C,
    models: ModelPair,
}

impl<C: Clock> ErrorClassifier<C> {
    pub fn new(clock: C, models: ModelPair) -> Self {
        Self { clock, models }
    }

    /// Classify `signal`. On a rate limit without a usable fallback this runs
    /// the countdown on `sink` before returning, unless no attempts are left.
    pub async fn classify(
        &self,
        signal: &FailureSignal,
        state: RetryState<'_>,
        sink: &dyn ResponseSink,
    ) -> Classification {
        let category = category_of(signal);
        let display = embeds::failure(category);

        if category == FailureCategory::Unknown {
            error!(message = %signal.message, status = ?signal.status, "Unclassified request failure");
        }

        if category != FailureCategory::RateLimited || state.attempts_left == 0 {
            return Classification {
                category,
                display,
                retry: RetryDirective::None,
            };
        }

        if state.fallback_enabled && !state.fallback_used {
            let next = self.models.fallback_for(state.current_model).to_string();
            info!(from = state.current_model, to = %next, "Rate limited; switching model");
            return Classification {
                category,
                display,
                retry: RetryDirective::RetryWithModel(next),
            };
        }

        self.countdown(sink).await;
        Classification {
            category,
            display,
            retry: RetryDirective::RetrySameModel,
        }
    }

    async fn countdown(&self, sink: &dyn ResponseSink) {
        for left in (1..=COUNTDOWN_TICKS).rev() {
            if let Err(e) = sink.edit(MessageUpdate::embed(embeds::countdown(left))).await {
                warn!("Failed to show retry countdown: {}", e);
            }
            self.clock.sleep(COUNTDOWN_TICK).await;
        }
    }
}
