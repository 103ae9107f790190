use std::time::Duration;

use discord_types::DiscordApiFailure;
use llm_gemini::GeminiError;

use super::*;
use crate::clock::MockClock;
use crate::sink::mock::MockSink;

fn classifier(clock: MockClock) -> ErrorClassifier<MockClock> {
    ErrorClassifier::new(clock, ModelPair::new("model-pro", "model-flash"))
}

fn state(fallback_enabled: bool, fallback_used: bool) -> RetryState<'static> {
    RetryState {
        current_model: "model-pro",
        fallback_enabled,
        fallback_used,
        attempts_left: 3,
    }
}

fn status(code: u16) -> FailureSignal {
    FailureSignal {
        message: format!("Gemini API {code}: boom"),
        status: Some(code),
    }
}

#[test]
fn category_table() {
    assert_eq!(category_of(&FailureSignal::from(&GeminiError::SafetyBlocked)), FailureCategory::Safety);
    assert_eq!(category_of(&FailureSignal::from(&GeminiError::EmptyResponse)), FailureCategory::Empty);
    assert_eq!(category_of(&status(400)), FailureCategory::UnsupportedRegion);
    assert_eq!(category_of(&status(429)), FailureCategory::RateLimited);
    assert_eq!(category_of(&status(500)), FailureCategory::UpstreamInternal);
    assert_eq!(category_of(&status(403)), FailureCategory::InvalidCredential);
    assert_eq!(category_of(&status(503)), FailureCategory::Unknown);
    assert_eq!(
        category_of(&FailureSignal {
            message: "connection reset".into(),
            status: None
        }),
        FailureCategory::Unknown
    );
}

#[test]
fn message_match_beats_status() {
    let signal = FailureSignal {
        message: "empty-response".into(),
        status: Some(429),
    };
    assert_eq!(category_of(&signal), FailureCategory::Empty);
}

#[test]
fn gemini_api_error_carries_status() {
    let err = GeminiError::Api {
        status: 429,
        message: "Resource has been exhausted".into(),
    };
    let signal = FailureSignal::from(&err);
    assert_eq!(signal.status, Some(429));
    assert_eq!(category_of(&signal), FailureCategory::RateLimited);
}

#[test]
fn discord_empty_message_maps_to_empty() {
    let failure = DiscordApiFailure::from_response(50006, 400, "Cannot send an empty message");
    assert_eq!(category_of(&FailureSignal::from(&failure)), FailureCategory::Empty);
}

#[test]
fn other_discord_failures_are_unknown() {
    let failure = DiscordApiFailure::from_response(50035, 400, "Invalid Form Body");
    assert_eq!(category_of(&FailureSignal::from(&failure)), FailureCategory::Unknown);
}

#[test]
fn fallback_pairing() {
    let pair = ModelPair::new("model-pro", "model-flash");
    assert_eq!(pair.fallback_for("model-pro"), "model-flash");
    assert_eq!(pair.fallback_for("model-flash"), "model-pro");
    assert_eq!(pair.fallback_for("something-else"), "model-pro");
}

#[tokio::test]
async fn empty_response_surfaces_without_retry() {
    let clock = MockClock::new();
    let sink = MockSink::new();
    let signal = FailureSignal {
        message: "empty-response".into(),
        status: None,
    };

    let c = classifier(clock.clone())
        .classify(&signal, state(false, false), &sink)
        .await;

    assert_eq!(c.category, FailureCategory::Empty);
    assert_eq!(c.retry, RetryDirective::None);
    assert_eq!(c.display, embeds::failure(FailureCategory::Empty));
    assert!(sink.edits().is_empty());
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn rate_limit_without_fallback_counts_down() {
    let clock = MockClock::new();
    let sink = MockSink::new();

    let c = classifier(clock.clone())
        .classify(&status(429), state(false, false), &sink)
        .await;

    assert_eq!(c.category, FailureCategory::RateLimited);
    assert_eq!(c.retry, RetryDirective::RetrySameModel);
    assert_eq!(
        sink.footers(),
        [5, 4, 3, 2, 1].map(|n| format!("⏱️ Retrying request in ({n})"))
    );
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 5]);
}

#[tokio::test]
async fn rate_limit_with_fallback_switches_model() {
    let clock = MockClock::new();
    let sink = MockSink::new();

    let c = classifier(clock.clone())
        .classify(&status(429), state(true, false), &sink)
        .await;

    assert_eq!(c.retry, RetryDirective::RetryWithModel("model-flash".into()));
    assert!(sink.edits().is_empty());
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn spent_fallback_falls_back_to_countdown() {
    let clock = MockClock::new();
    let sink = MockSink::new();

    let c = classifier(clock.clone())
        .classify(&status(429), state(true, true), &sink)
        .await;

    assert_eq!(c.retry, RetryDirective::RetrySameModel);
    assert_eq!(sink.edits().len(), 5);
}

#[tokio::test]
async fn last_attempt_skips_countdown_and_fallback() {
    for fallback_enabled in [false, true] {
        let clock = MockClock::new();
        let sink = MockSink::new();
        let last = RetryState {
            attempts_left: 0,
            ..state(fallback_enabled, false)
        };

        let c = classifier(clock.clone())
            .classify(&status(429), last, &sink)
            .await;

        assert_eq!(c.category, FailureCategory::RateLimited);
        assert_eq!(c.retry, RetryDirective::None);
        assert_eq!(c.display, embeds::failure(FailureCategory::RateLimited));
        assert!(sink.edits().is_empty());
        assert!(clock.sleeps().is_empty());
    }
}

#[tokio::test]
async fn non_retry_categories_do_not_touch_the_sink() {
    for code in [400u16, 403, 500, 502] {
        let sink = MockSink::new();
        let c = classifier(MockClock::new())
            .classify(&status(code), state(true, false), &sink)
            .await;
        assert!(!c.retry.is_retry(), "status {code} should not retry");
        assert!(sink.edits().is_empty());
    }
}
