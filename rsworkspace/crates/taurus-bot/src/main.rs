//! Taurus: a Discord bot that answers mentions, replies, slash commands and
//! context menus with Google Gemini.

mod classifier;
mod clock;
mod commands;
mod config;
mod discord;
mod embeds;
mod errors;
mod format;
mod handlers;
mod health;
mod indicator;
mod instruction;
mod responder;
mod settings;
mod sink;
mod thread;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use llm_gemini::GeminiClient;
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::classifier::{ErrorClassifier, ModelPair};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::handlers::{BotState, Handler};
use crate::health::AppState;
use crate::instruction::Personality;
use crate::responder::{GeminiChat, Responder};
use crate::settings::SettingsStore;

/// Taurus bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/taurus-bot.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Model used unless the settings store names another (overrides config file)
    #[arg(long, env = "GEMINI_PRIMARY_MODEL")]
    primary_model: Option<String>,

    /// Settings store location (overrides config file)
    #[arg(long, env = "TAURUS_SETTINGS_PATH")]
    settings_path: Option<String>,

    /// Health check server port (overrides config file)
    #[arg(long, env = "HEALTH_CHECK_PORT")]
    health_port: Option<u16>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(bot_token) = self.bot_token {
            config.discord.bot_token = bot_token;
        }
        if let Some(model) = self.primary_model {
            config.gemini.primary_model = model;
        }
        if let Some(path) = self.settings_path {
            config.bot.settings_path = path;
        }
        if let Some(port) = self.health_port {
            config.bot.health_port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taurus_bot=debug,llm_gemini=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::panic::set_hook(Box::new(|panic| {
        error!("Panic: {}", panic);
    }));

    info!("Starting Taurus");

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };
    args.apply(&mut config);

    if config.discord.bot_token.is_empty() {
        anyhow::bail!("Discord bot token is not set");
    }
    if config.discord.owners.is_empty() {
        warn!("No owners configured; /model and /apikey are unusable");
    }
    if Personality::load(&config.bot.personality_path).await.is_empty() {
        warn!(
            "Personality file {} is empty or missing",
            config.bot.personality_path
        );
    }

    let settings = Arc::new(
        SettingsStore::open(&config.bot.settings_path, &config.gemini.primary_model)
            .await
            .context("Failed to open settings store")?,
    );
    info!(
        path = %settings.path().display(),
        model = %settings.snapshot().model.model,
        "Settings loaded"
    );

    let gemini = GeminiClient::new(config.gemini_client_config())
        .context("Failed to build Gemini client")?;
    let classifier = ErrorClassifier::new(
        SystemClock,
        ModelPair::new(&config.gemini.primary_model, &config.gemini.fallback_model),
    );
    let responder = Responder::new(
        GeminiChat::new(gemini.clone(), settings.clone()),
        classifier,
        config.discord.integrator_id,
    );

    let health_state = AppState::new();
    let health_port = config.bot.health_port;
    let bot_token = config.discord.bot_token.clone();
    let state = Arc::new(BotState::new(
        config,
        settings.clone(),
        gemini,
        responder,
        health_state.clone(),
    ));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_PRESENCES;

    let mut client = Client::builder(&bot_token, intents)
        .event_handler(Handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    {
        let mut data = client.data.write().await;
        data.insert::<BotState>(state);
    }

    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_state, health_port).await {
            error!("Health server error: {}", e);
        }
    });

    // Settings edited on disk take effect on SIGHUP.
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sighup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
        let settings = settings.clone();
        tokio::spawn(async move {
            while sighup.recv().await.is_some() {
                if let Err(e) = settings.reload().await {
                    error!("Settings reload failed, keeping previous settings: {}", e);
                }
            }
        });
    }

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    #[cfg(unix)]
    let mut sigterm = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");

    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;

    info!("Taurus stopped");
    Ok(())
}
