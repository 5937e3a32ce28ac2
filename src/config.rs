//! Configuration for the gesture agent.
//!
//! One YAML file, read once at startup. Only the `gestures` section is
//! required:
//!
//! ```yaml
//! gestures:
//!   heart:
//!     name: Heart
//!     action: lights_toggle
//!     description: Toggle the living room lights
//!     cooldown: 2.5
//! classifier:
//!   heart_touch_distance: 0.06
//! provider:
//!   command: hand-landmarks
//! backend:
//!   kind: home_assistant
//! ```

use crate::backend::BackendSettings;
use crate::dispatch::{GestureAction, GestureTable, DEFAULT_COOLDOWN_SECS};
use crate::gesture::{ClassifierThresholds, GestureLabel, InvalidThreshold};
use crate::provider::ProviderSettings;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config and data dirs.
pub const APP_DIR: &str = "gesture-home";

/// Config file looked up relative to the working directory.
pub const LOCAL_CONFIG_PATH: &str = "config/gestures.yaml";

const CONFIG_FILE: &str = "gestures.yaml";
const ACTIVITY_FILE: &str = "activity.json";

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub gestures: GestureTable,
    pub classifier: ClassifierThresholds,
    pub provider: ProviderSettings,
    pub backend: BackendSettings,
    /// File this configuration was read from
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    gestures: Option<BTreeMap<String, RawGesture>>,
    #[serde(default)]
    classifier: ClassifierThresholds,
    #[serde(default)]
    provider: ProviderSettings,
    #[serde(default)]
    backend: BackendSettings,
}

#[derive(Debug, Deserialize)]
struct RawGesture {
    name: Option<String>,
    action: Option<String>,
    description: Option<String>,
    cooldown: Option<f64>,
}

impl Config {
    /// Load from `explicit`, or the first default location that exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::resolve_path(explicit);
        Self::load_file(&path)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content, path)
    }

    /// Parse and validate YAML text. `path` is only used for messages.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let entries = raw.gestures.ok_or(ConfigError::MissingGestures)?;
        let gestures = build_table(entries)?;
        if gestures.is_empty() {
            tracing::warn!(
                path = %path.display(),
                "No gestures configured; nothing will be dispatched"
            );
        }

        raw.classifier.validate()?;
        validate_provider(&raw.provider)?;

        Ok(Self {
            gestures,
            classifier: raw.classifier,
            provider: raw.provider,
            backend: raw.backend,
            path: path.to_path_buf(),
        })
    }

    /// `explicit` if given, else `./config/gestures.yaml` if present, else
    /// the per-user config file.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let local = PathBuf::from(LOCAL_CONFIG_PATH);
        if local.exists() {
            return local;
        }
        Self::user_config_path()
    }

    pub fn user_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CONFIG_FILE)
    }

    /// Directory for runtime state such as the activity log.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn activity_path() -> PathBuf {
        Self::data_dir().join(ACTIVITY_FILE)
    }
}

fn build_table(entries: BTreeMap<String, RawGesture>) -> Result<GestureTable, ConfigError> {
    let mut table = GestureTable::new();

    for (key, raw) in entries {
        let label = match key.parse::<GestureLabel>() {
            Ok(label) if !label.is_none() => label,
            Ok(_) => {
                tracing::warn!(gesture = %key, "'none' cannot trigger an action; ignoring");
                continue;
            }
            Err(e) => {
                tracing::warn!("{e} in config; ignoring");
                continue;
            }
        };

        let required = |value: Option<String>, field: &'static str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    gesture: key.clone(),
                    field,
                })
        };
        let name = required(raw.name, "name")?;
        let action = required(raw.action, "action")?;
        let description = required(raw.description, "description")?;
        let cooldown = raw.cooldown.unwrap_or(DEFAULT_COOLDOWN_SECS);

        let entry = GestureAction::new(name, action, description, cooldown).map_err(|_| {
            ConfigError::InvalidCooldown {
                gesture: key.clone(),
                value: cooldown,
            }
        })?;

        if table.get(label).is_some() {
            tracing::warn!(gesture = %key, "Gesture configured more than once; last entry wins");
        }
        table.insert(label, entry);
    }

    Ok(table)
}

fn validate_provider(settings: &ProviderSettings) -> Result<(), ConfigError> {
    if settings.command.trim().is_empty() {
        return Err(ConfigError::InvalidProvider(
            "command must not be empty".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&settings.min_confidence) {
        return Err(ConfigError::InvalidProvider(format!(
            "min_confidence must be within [0, 1], got {}",
            settings.min_confidence
        )));
    }
    Ok(())
}

/// Fatal configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
    #[error("invalid YAML in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("config has no 'gestures' section")]
    MissingGestures,
    #[error("gesture '{gesture}' is missing required field '{field}'")]
    MissingField {
        gesture: String,
        field: &'static str,
    },
    #[error("gesture '{gesture}' has invalid cooldown {value}; expected seconds > 0")]
    InvalidCooldown { gesture: String, value: f64 },
    #[error(transparent)]
    InvalidThreshold(#[from] InvalidThreshold),
    #[error("invalid provider settings: {0}")]
    InvalidProvider(String),
}
