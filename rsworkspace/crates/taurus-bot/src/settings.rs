//! Runtime settings changed by the owner commands.
//!
//! Stored as a small JSON document with one top-level key per entry:
//!
//! ```json
//! {
//!   "model": { "model": "gemini-1.5-pro-latest", "safetySystem": true, "fallbackSystem": false },
//!   "apiKeys": { "gemini": "...", "prodia": "..." }
//! }
//! ```
//!
//! Readers take an immutable snapshot per request; the snapshot is only
//! replaced by [`SettingsStore::reload`] or a successful write.

#[cfg(test)]
#[path = "settings_tests.rs"]
mod settings_tests;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_true")]
    pub safety_system: bool,
    #[serde(default)]
    pub fallback_system: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            safety_system: true,
            fallback_system: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub gemini: String,
    #[serde(default)]
    pub prodia: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default, rename = "apiKeys")]
    pub api_keys: ApiKeys,
}

impl Settings {
    pub fn with_default_model(default_model: &str) -> Self {
        let mut settings = Self::default();
        settings.model.model = default_model.to_string();
        settings
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct SettingsStore {
    path: PathBuf,
    default_model: String,
    current: ArcSwap<Settings>,
    /// Held across read-modify-write so concurrent updates apply in turn.
    writer: Mutex<()>,
}

impl SettingsStore {
    /// Load the store at `path`. A missing file yields defaults and is not created.
    pub async fn open(
        path: impl Into<PathBuf>,
        default_model: impl Into<String>,
    ) -> Result<Self, SettingsError> {
        let path = path.into();
        let default_model = default_model.into();
        let settings = read_settings(&path, &default_model).await?;
        Ok(Self {
            path,
            default_model,
            current: ArcSwap::from_pointee(settings),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The settings in effect right now.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Re-read the file and swap in the result. On error the old snapshot stays.
    pub async fn reload(&self) -> Result<Arc<Settings>, SettingsError> {
        let _guard = self.writer.lock().await;
        let settings = Arc::new(read_settings(&self.path, &self.default_model).await?);
        self.current.store(settings.clone());
        info!(path = %self.path.display(), model = %settings.model.model, "Settings reloaded");
        Ok(settings)
    }

    /// Apply `change` to the current settings, persist, then publish.
    pub async fn update<F>(&self, change: F) -> Result<Arc<Settings>, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.writer.lock().await;
        let mut next = Settings::clone(&self.snapshot());
        change(&mut next);
        write_settings(&self.path, &next).await?;
        let next = Arc::new(next);
        self.current.store(next.clone());
        debug!(path = %self.path.display(), "Settings written");
        Ok(next)
    }
}

async fn read_settings(path: &Path, default_model: &str) -> Result<Settings, SettingsError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No settings file; using defaults");
            return Ok(Settings::with_default_model(default_model));
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut settings: Settings =
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if settings.model.model.is_empty() {
        settings.model.model = default_model.to_string();
    }
    Ok(settings)
}

/// Write to a sibling temp file and rename over the target.
async fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let body = serde_json::to_vec_pretty(settings)?;
    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, body).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

fn default_true() -> bool {
    true
}
