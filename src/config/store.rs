//! Persisted settings
//!
//! The store is an opaque asynchronous key/value collaborator. The overlay only
//! talks to it through `load_settings` / `save_settings`, which never fail:
//! reads fall back to defaults and writes are best-effort.

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::settings::OverlaySettings;
use crate::constants;

pub trait SettingsStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>>;
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<()>>;
}

/// Load the overlay settings, falling back to defaults when absent or unreadable
pub async fn load_settings<S: SettingsStore>(store: &S) -> OverlaySettings {
    match store.get(constants::config::SETTINGS_KEY).await {
        Ok(Some(value)) => match serde_json::from_value::<OverlaySettings>(value) {
            Ok(settings) => {
                info!("Loaded overlay settings");
                settings.validated()
            }
            Err(e) => {
                error!(error = %e, "Stored settings are malformed, using defaults");
                OverlaySettings::default()
            }
        },
        Ok(None) => {
            info!("No stored settings, using defaults");
            OverlaySettings::default()
        }
        Err(e) => {
            error!(error = ?e, "Failed to read settings, using defaults");
            OverlaySettings::default()
        }
    }
}

/// Persist the overlay settings; failures are logged and swallowed
pub async fn save_settings<S: SettingsStore>(store: &S, settings: &OverlaySettings) {
    let value = match serde_json::to_value(settings) {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "Failed to serialize settings");
            return;
        }
    };
    match store.set(constants::config::SETTINGS_KEY, value).await {
        Ok(()) => debug!("Saved overlay settings"),
        Err(e) => warn!(error = ?e, "Failed to save settings"),
    }
}

/// Settings kept as one JSON object on disk, keyed like the browser's storage area
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/live-chat-overlay/settings.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e).context(format!("Failed to read settings file {}", self.path.display()));
            }
        };
        match serde_json::from_str::<Value>(&contents)
            .context(format!("Failed to parse settings file {}", self.path.display()))?
        {
            Value::Object(map) => Ok(map),
            other => bail!(
                "Settings file {} holds {} instead of an object",
                self.path.display(),
                json_kind(&other)
            ),
        }
    }
}

impl SettingsStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        // A corrupt file is left for the user to fix rather than overwritten
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create settings directory {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(&Value::Object(map))
            .context("Failed to serialize settings store")?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .context(format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context(format!("Failed to replace settings file {}", self.path.display()))?;
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
