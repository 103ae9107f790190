//! Serenity event handler implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serenity::async_trait;
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
    EditInteractionResponse,
};
use serenity::http::Http;
use serenity::model::application::{
    ActionRow, ActionRowComponent, Command, CommandInteraction, ComponentInteraction, Interaction,
    ModalInteraction, ResolvedTarget,
};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::model::user::User;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use discord_types::Embed;
use llm_gemini::GeminiClient;
use llm_types::ConversationThread;

use crate::classifier::FailureCategory;
use crate::clock::SystemClock;
use crate::commands::{self, ApiKeyChange, ModelChange};
use crate::config::Config;
use crate::discord::{convert_message, to_create_embed, ChannelMessages, InteractionSink, MessageSink};
use crate::embeds;
use crate::errors::log_error;
use crate::format::ContextTarget;
use crate::health::AppState;
use crate::indicator::{Ticker, TYPING_PERIOD};
use crate::instruction::{system_instruction, DevicePresence, Personality};
use crate::responder::{GeminiChat, Responder, ResponseJob};
use crate::settings::SettingsStore;
use crate::sink::{MessageUpdate, ResponseSink};
use crate::thread::{TerminationReason, ThreadWalker};

/// Everything the handlers share, stored once in the client's `TypeMap`.
pub struct BotState {
    pub config: Config,
    pub settings: Arc<SettingsStore>,
    pub gemini: GeminiClient,
    pub responder: Responder<GeminiChat, SystemClock>,
    pub health: AppState,
    bot_id: AtomicU64,
}

impl TypeMapKey for BotState {
    type Value = Arc<BotState>;
}

impl BotState {
    pub fn new(
        config: Config,
        settings: Arc<SettingsStore>,
        gemini: GeminiClient,
        responder: Responder<GeminiChat, SystemClock>,
        health: AppState,
    ) -> Self {
        Self {
            config,
            settings,
            gemini,
            responder,
            health,
            bot_id: AtomicU64::new(0),
        }
    }

    /// The bot's own user id, known once `ready` has fired.
    pub fn bot_id(&self) -> Option<u64> {
        match self.bot_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    fn set_bot_id(&self, id: u64) {
        self.bot_id.store(id, Ordering::Release);
    }

    async fn system_instruction(&self, user_id: u64, presence: &[DevicePresence]) -> String {
        let personality = Personality::load(&self.config.bot.personality_path).await;
        system_instruction(&personality, user_id, presence)
    }
}

/// A message is for the bot when a human mentions it or replies to it.
pub fn is_addressed_to_bot(author_is_bot: bool, mentions_bot: bool, replies_to_bot: bool) -> bool {
    !author_is_bot && (mentions_bot || replies_to_bot)
}

pub struct Handler;

async fn bot_state(ctx: &Context) -> Option<Arc<BotState>> {
    let data = ctx.data.read().await;
    let state = data.get::<BotState>().cloned();
    if state.is_none() {
        error!("BotState not found in context data");
    }
    state
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.tag());

        let Some(state) = bot_state(&ctx).await else {
            return;
        };
        state.set_bot_id(ready.user.id.get());
        state.health.set_bot_username(ready.user.tag()).await;

        match Command::set_global_commands(&ctx.http, commands::definitions()).await {
            Ok(registered) => info!("Registered {} global commands", registered.len()),
            Err(e) => log_error("Failed to register global commands", &e),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(state) = bot_state(&ctx).await else {
            return;
        };
        let Some(bot_id) = state.bot_id() else {
            debug!("Message before ready; ignoring");
            return;
        };

        let replies_to_bot = msg
            .referenced_message
            .as_ref()
            .is_some_and(|r| r.author.id.get() == bot_id);
        let mentions_bot = msg.mentions_user_id(UserId::new(bot_id));
        if !is_addressed_to_bot(msg.author.bot, mentions_bot, replies_to_bot) {
            return;
        }

        answer_message(&ctx, &state, bot_id, &msg).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Some(state) = bot_state(&ctx).await else {
            return;
        };

        match interaction {
            Interaction::Command(cmd) => match cmd.data.name.as_str() {
                commands::ASK => open_ask_modal(&ctx, &cmd).await,
                commands::HELP => show_help(&ctx, &cmd).await,
                commands::MODEL => change_model(&ctx, &state, &cmd).await,
                commands::APIKEY => change_api_key(&ctx, &state, &cmd).await,
                commands::ASK_CONTEXT_MENU => answer_context_menu(&ctx, &state, &cmd).await,
                other => debug!("Unhandled command: {}", other),
            },
            Interaction::Component(comp) => {
                if comp.data.custom_id == commands::ASK_BUTTON_ID {
                    open_ask_modal_from_button(&ctx, &comp).await;
                }
            }
            Interaction::Modal(modal) => {
                if modal.data.custom_id == commands::ASK_MODAL_ID {
                    answer_modal(&ctx, &state, &modal).await;
                }
            }
            _ => {}
        }
    }
}

// ── Mentions and replies ───────────────────────────────────────────────────

async fn answer_message(ctx: &Context, state: &BotState, bot_id: u64, msg: &Message) {
    if let Err(e) = ctx.http.broadcast_typing(msg.channel_id).await {
        log_error("Failed to send typing", &e);
    }
    let typing = start_typing(ctx.http.clone(), msg.channel_id);

    let avatar = msg.author.face();
    let placeholder = state.responder.placeholder(Some(&avatar));
    let reply = CreateMessage::new()
        .embed(to_create_embed(&placeholder))
        .reference_message(msg);
    let sent = match msg.channel_id.send_message(&ctx.http, reply).await {
        Ok(sent) => sent,
        Err(e) => {
            log_error("Failed to send placeholder", &e);
            return;
        }
    };
    let sink: Arc<dyn ResponseSink> =
        Arc::new(MessageSink::new(ctx.http.clone(), msg.channel_id, sent.id));

    let store = ChannelMessages::new(ctx.http.clone(), msg.channel_id);
    let reconstruction = match ThreadWalker::new(bot_id)
        .reconstruct(&convert_message(msg), &store)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            error!(message_id = msg.id.get(), "Failed to walk reply thread: {}", e);
            show(&*sink, embeds::failure(FailureCategory::Unknown)).await;
            state.health.record_request();
            return;
        }
    };
    debug!(
        turns = reconstruction.turns.len(),
        termination = ?reconstruction.termination,
        "Reply thread reconstructed"
    );

    let presence = presence_of(ctx, msg.guild_id, msg.author.id);
    let job = ResponseJob {
        prompt: reconstruction.latest_user_text,
        history: reconstruction.turns,
        system_instruction: state.system_instruction(msg.author.id.get(), &presence).await,
        requester_id: msg.author.id.get(),
        requester_avatar: Some(avatar),
        context: None,
        termination: reconstruction.termination,
    };

    let outcome = state
        .responder
        .respond(&job, &state.settings.snapshot(), sink)
        .await;
    typing.stop().await;
    state.health.record_request();
    info!(message_id = msg.id.get(), ?outcome, "Mention handled");
}

// ── Interactions ───────────────────────────────────────────────────────────

async fn open_ask_modal(ctx: &Context, cmd: &CommandInteraction) {
    let response = CreateInteractionResponse::Modal(commands::ask_modal());
    if let Err(e) = cmd.create_response(&ctx.http, response).await {
        log_error("Failed to open ask modal", &e);
    }
}

async fn open_ask_modal_from_button(ctx: &Context, comp: &ComponentInteraction) {
    let response = CreateInteractionResponse::Modal(commands::ask_modal());
    if let Err(e) = comp.create_response(&ctx.http, response).await {
        log_error("Failed to open ask modal", &e);
    }
}

async fn show_help(ctx: &Context, cmd: &CommandInteraction) {
    let registered = match Command::get_global_commands(&ctx.http).await {
        Ok(registered) => registered,
        Err(e) => {
            log_error("Failed to fetch global commands", &e);
            Vec::new()
        }
    };
    let embed = embeds::help(&commands::help_entries(&registered));
    let message = CreateInteractionResponseMessage::new()
        .embed(to_create_embed(&embed))
        .components(vec![commands::ask_button_row()]);
    if let Err(e) = cmd
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await
    {
        log_error("Failed to send help", &e);
    }
}

async fn reply_ephemeral(ctx: &Context, cmd: &CommandInteraction, embed: Embed) {
    let message = CreateInteractionResponseMessage::new()
        .embed(to_create_embed(&embed))
        .ephemeral(true);
    if let Err(e) = cmd
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await
    {
        log_error("Failed to reply to command", &e);
    }
}

/// Answers non-owners and returns whether the caller may continue.
async fn require_owner(ctx: &Context, state: &BotState, cmd: &CommandInteraction) -> bool {
    if state.config.is_owner(cmd.user.id.get()) {
        return true;
    }
    warn!(user = cmd.user.id.get(), command = %cmd.data.name, "Owner command refused");
    reply_ephemeral(ctx, cmd, embeds::owner_only()).await;
    false
}

async fn change_model(ctx: &Context, state: &BotState, cmd: &CommandInteraction) {
    if !require_owner(ctx, state, cmd).await {
        return;
    }

    let change = ModelChange::from_args(&commands::option_args(&cmd.data.options()));
    if change.is_empty() {
        let current = commands::describe_model(&state.settings.snapshot());
        let embed = embeds::settings_error(format!(
            "> *Provide at least one option to change.*\n\n{current}"
        ));
        reply_ephemeral(ctx, cmd, embed).await;
        return;
    }

    let embed = match state.settings.update(|s| change.apply(s)).await {
        Ok(updated) => {
            info!(model = %updated.model.model, "Model settings changed");
            embeds::settings_updated(commands::describe_model(&updated))
        }
        Err(e) => {
            error!("Failed to save model settings: {}", e);
            embeds::settings_error("> *The settings could not be saved.*")
        }
    };
    reply_ephemeral(ctx, cmd, embed).await;
}

async fn change_api_key(ctx: &Context, state: &BotState, cmd: &CommandInteraction) {
    if !require_owner(ctx, state, cmd).await {
        return;
    }

    let change = match ApiKeyChange::from_args(&commands::option_args(&cmd.data.options())) {
        Ok(change) => change,
        Err(reason) => {
            reply_ephemeral(ctx, cmd, embeds::settings_error(format!("> *{reason}*"))).await;
            return;
        }
    };

    // The probe can outlive the 3 s interaction deadline.
    let defer = CreateInteractionResponse::Defer(
        CreateInteractionResponseMessage::new().ephemeral(true),
    );
    if let Err(e) = cmd.create_response(&ctx.http, defer).await {
        log_error("Failed to defer apikey command", &e);
        return;
    }

    let kind = change.kind.as_str();
    let embed = if !state.gemini.check_api_key(change.kind, &change.key).await {
        info!(kind, "Rejected invalid API key");
        embeds::settings_error(format!("> **The API Key for {kind} is invalid.**"))
    } else {
        match state.settings.update(|s| change.apply(s)).await {
            Ok(_) => {
                info!(kind, "API key updated");
                embeds::settings_updated(format!("> **The {kind} API Key has been updated.**"))
            }
            Err(e) => {
                error!("Failed to save API key: {}", e);
                embeds::settings_error("> *The settings could not be saved.*")
            }
        }
    };

    let edit = EditInteractionResponse::new().embed(to_create_embed(&embed));
    if let Err(e) = cmd.edit_response(&ctx.http, edit).await {
        log_error("Failed to answer apikey command", &e);
    }
}

async fn answer_context_menu(ctx: &Context, state: &BotState, cmd: &CommandInteraction) {
    let Some(ResolvedTarget::Message(target)) = cmd.data.target() else {
        warn!("Context menu invoked without a target message");
        return;
    };
    let context = ContextTarget {
        author_tag: target.author.tag(),
        content: target.content.clone(),
    };

    let avatar = cmd.user.face();
    if let Err(e) = cmd
        .create_response(&ctx.http, loading_response(state, &avatar))
        .await
    {
        log_error("Failed to send placeholder", &e);
        return;
    }

    let request = InteractionRequest {
        token: &cmd.token,
        user: &cmd.user,
        guild_id: cmd.guild_id,
        channel_id: cmd.channel_id,
        prompt: target.content.clone(),
        context: Some(context),
        termination: TerminationReason::None,
    };
    answer_interaction(ctx, state, request).await;
}

async fn answer_modal(ctx: &Context, state: &BotState, modal: &ModalInteraction) {
    let Some(question) = modal_input(&modal.data.components, commands::ASK_INPUT_ID) else {
        warn!("Ask modal submitted without a question");
        return;
    };

    let avatar = modal.user.face();
    if let Err(e) = modal
        .create_response(&ctx.http, loading_response(state, &avatar))
        .await
    {
        log_error("Failed to send placeholder", &e);
        return;
    }

    let request = InteractionRequest {
        token: &modal.token,
        user: &modal.user,
        guild_id: modal.guild_id,
        channel_id: modal.channel_id,
        prompt: question,
        context: None,
        termination: TerminationReason::SlashCommandOrigin,
    };
    answer_interaction(ctx, state, request).await;
}

struct InteractionRequest<'a> {
    token: &'a str,
    user: &'a User,
    guild_id: Option<GuildId>,
    channel_id: ChannelId,
    prompt: String,
    context: Option<ContextTarget>,
    termination: TerminationReason,
}

/// Answer an interaction whose loading reply has already been sent.
async fn answer_interaction(ctx: &Context, state: &BotState, request: InteractionRequest<'_>) {
    let typing = bot_in_guild(ctx, request.guild_id)
        .then(|| start_typing(ctx.http.clone(), request.channel_id));

    let sink: Arc<dyn ResponseSink> = Arc::new(InteractionSink::new(ctx.http.clone(), request.token));
    let user_id = request.user.id.get();
    let presence = presence_of(ctx, request.guild_id, request.user.id);
    let job = ResponseJob {
        prompt: request.prompt,
        history: ConversationThread::new(),
        system_instruction: state.system_instruction(user_id, &presence).await,
        requester_id: user_id,
        requester_avatar: Some(request.user.face()),
        context: request.context,
        termination: request.termination,
    };

    let outcome = state
        .responder
        .respond(&job, &state.settings.snapshot(), sink)
        .await;
    if let Some(typing) = typing {
        typing.stop().await;
    }
    state.health.record_request();
    info!(user = user_id, ?outcome, "Interaction handled");
}

fn loading_response(state: &BotState, avatar: &str) -> CreateInteractionResponse {
    let placeholder = state.responder.placeholder(Some(avatar));
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new().embed(to_create_embed(&placeholder)),
    )
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn start_typing(http: Arc<Http>, channel_id: ChannelId) -> Ticker {
    Ticker::start(TYPING_PERIOD, move |_| {
        let http = http.clone();
        async move {
            if let Err(e) = http.broadcast_typing(channel_id).await {
                log_error("Failed to send typing", &e);
            }
        }
    })
}

async fn show(sink: &dyn ResponseSink, embed: Embed) {
    if let Err(e) = sink.edit(MessageUpdate::embed(embed)).await {
        warn!("Failed to update placeholder: {}", e);
    }
}

fn bot_in_guild(ctx: &Context, guild_id: Option<GuildId>) -> bool {
    guild_id.is_some_and(|gid| ctx.cache.guild(gid).is_some())
}

/// Per-device presence of `user_id` as seen in the guild cache.
fn presence_of(ctx: &Context, guild_id: Option<GuildId>, user_id: UserId) -> Vec<DevicePresence> {
    let Some(guild) = guild_id.and_then(|gid| ctx.cache.guild(gid)) else {
        return Vec::new();
    };
    let Some(status) = guild
        .presences
        .get(&user_id)
        .and_then(|p| p.client_status.clone())
    else {
        return Vec::new();
    };
    [
        ("desktop", status.desktop),
        ("mobile", status.mobile),
        ("web", status.web),
    ]
    .into_iter()
    .filter_map(|(platform, s)| s.map(|s| (platform.to_string(), s.name().to_string())))
    .collect()
}

fn modal_input(rows: &[ActionRow], custom_id: &str) -> Option<String> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == custom_id => {
                input.value.clone()
            }
            _ => None,
        })
        .filter(|v| !v.trim().is_empty())
}
