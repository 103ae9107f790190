//! Runs one request end to end: prompt the model, format the answer, write
//! it into the placeholder, and retry on the classifier's say-so.

#[cfg(test)]
#[path = "responder_tests.rs"]
mod responder_tests;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use llm_gemini::{GeminiClient, GeminiError};
use llm_types::{ConversationThread, PromptRequest};
use tracing::{debug, info, warn};

use crate::classifier::{ErrorClassifier, FailureCategory, FailureSignal, RetryDirective, RetryState};
use crate::clock::Clock;
use crate::embeds::{self, LOADING_FRAMES};
use crate::format::{format_response, ContextTarget, FormatOutcome};
use crate::indicator::{Ticker, LOADING_PERIOD};
use crate::settings::{Settings, SettingsStore};
use crate::sink::{MessageUpdate, ResponseSink};
use crate::thread::TerminationReason;

/// Upper bound on model calls for one request, retries included.
pub const MAX_ATTEMPTS: u32 = 4;

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, model: &str, request: &PromptRequest) -> Result<String, GeminiError>;
}

/// Gemini, keyed with whatever API key the settings hold at call time.
pub struct GeminiChat {
    client: GeminiClient,
    settings: Arc<SettingsStore>,
}

impl GeminiChat {
    pub fn new(client: GeminiClient, settings: Arc<SettingsStore>) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn generate(&self, model: &str, request: &PromptRequest) -> Result<String, GeminiError> {
        let api_key = self.settings.snapshot().api_keys.gemini.clone();
        self.client.generate(&api_key, model, request).await
    }
}

/// Everything needed to answer one user utterance.
#[derive(Debug, Clone)]
pub struct ResponseJob {
    pub prompt: String,
    pub history: ConversationThread,
    pub system_instruction: String,
    /// The only user the answer may mention.
    pub requester_id: u64,
    pub requester_avatar: Option<String>,
    pub context: Option<ContextTarget>,
    pub termination: TerminationReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Delivered,
    /// The answer mentioned someone else and was withheld.
    Rejected,
    Failed(FailureCategory),
    /// Still failing after [`MAX_ATTEMPTS`].
    GaveUp,
}

pub struct Responder<M: ChatModel, C: Clock> {
    chat: M,
    classifier: ErrorClassifier<C>,
    integrator_id: Option<u64>,
    loading_period: Duration,
}

impl<M: ChatModel, C: Clock> Responder<M, C> {
    pub fn new(chat: M, classifier: ErrorClassifier<C>, integrator_id: Option<u64>) -> Self {
        Self {
            chat,
            classifier,
            integrator_id,
            loading_period: LOADING_PERIOD,
        }
    }

    /// The placeholder embed a request starts with.
    pub fn placeholder(&self, avatar_url: Option<&str>) -> discord_types::Embed {
        embeds::loading(LOADING_FRAMES.len() - 1, avatar_url, self.integrator_id)
    }

    pub fn build_request(job: &ResponseJob, settings: &Settings) -> PromptRequest {
        PromptRequest::new(job.history.clone(), job.prompt.as_str())
            .with_system_instruction(job.system_instruction.as_str())
            .with_safety(settings.model.safety_system)
    }

    pub async fn respond(
        &self,
        job: &ResponseJob,
        settings: &Settings,
        sink: Arc<dyn ResponseSink>,
    ) -> ResponseOutcome {
        let request = Self::build_request(job, settings);
        let mut model = settings.model.model.clone();
        let mut fallback_used = false;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let placeholder = self.placeholder(job.requester_avatar.as_deref());
                if let Err(e) = sink.edit(MessageUpdate::embed(placeholder)).await {
                    debug!("Failed to reset placeholder: {}", e);
                }
            }

            debug!(attempt, model = %model, turns = request.turns.len(), "Requesting answer");
            let animation = self.start_animation(job, sink.clone());
            let answer = self.chat.generate(&model, &request).await;
            animation.stop().await;

            let signal = match answer {
                Ok(text) => {
                    match format_response(
                        &text,
                        job.requester_id,
                        job.context.as_ref(),
                        job.termination,
                    ) {
                        FormatOutcome::Ready { content, embeds } => {
                            match sink.edit(MessageUpdate::answer(content, embeds)).await {
                                Ok(()) => {
                                    info!(attempt, model = %model, "Answer delivered");
                                    return ResponseOutcome::Delivered;
                                }
                                Err(e) => FailureSignal::from(&e),
                            }
                        }
                        FormatOutcome::Rejected { embed } => {
                            warn!(requester = job.requester_id, "Answer mentions someone else; withheld");
                            if let Err(e) = sink.edit(MessageUpdate::embed(embed)).await {
                                warn!("Failed to show mention rejection: {}", e);
                            }
                            return ResponseOutcome::Rejected;
                        }
                    }
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Model call failed");
                    FailureSignal::from(&e)
                }
            };

            let state = RetryState {
                current_model: &model,
                fallback_enabled: settings.model.fallback_system,
                fallback_used,
                attempts_left: MAX_ATTEMPTS - attempt,
            };
            let classification = self.classifier.classify(&signal, state, sink.as_ref()).await;

            match classification.retry {
                RetryDirective::None
                    if classification.category == FailureCategory::RateLimited
                        && attempt == MAX_ATTEMPTS =>
                {
                    break;
                }
                RetryDirective::None => {
                    if let Err(e) = sink.edit(MessageUpdate::embed(classification.display)).await {
                        warn!("Failed to show error: {}", e);
                    }
                    return ResponseOutcome::Failed(classification.category);
                }
                RetryDirective::RetrySameModel => {}
                RetryDirective::RetryWithModel(next) => {
                    model = next;
                    fallback_used = true;
                }
            }
        }

        warn!(attempts = MAX_ATTEMPTS, "Giving up on request");
        if let Err(e) = sink
            .edit(MessageUpdate::embed(embeds::failure(FailureCategory::RateLimited)))
            .await
        {
            warn!("Failed to show error: {}", e);
        }
        ResponseOutcome::GaveUp
    }

    fn start_animation(&self, job: &ResponseJob, sink: Arc<dyn ResponseSink>) -> Ticker {
        let avatar = job.requester_avatar.clone();
        let integrator_id = self.integrator_id;
        Ticker::start(self.loading_period, move |tick| {
            let sink = sink.clone();
            let frame = embeds::loading(tick as usize, avatar.as_deref(), integrator_id);
            async move {
                if let Err(e) = sink.edit(MessageUpdate::embed(frame)).await {
                    debug!("Loading frame not shown: {}", e);
                }
            }
        })
    }
}
