//! Smart-home backends.
//!
//! A backend turns an action name (e.g. `lights_toggle`) into a call against
//! a home automation service. All variants share [`HttpTransport`] and read
//! their credentials from the environment.

pub mod google_sdm;
pub mod home_assistant;
pub mod http;
pub mod ifttt;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use google_sdm::GoogleSdmBackend;
pub use home_assistant::HomeAssistantBackend;
pub use http::{HttpReply, HttpTransport};
pub use ifttt::IftttBackend;

/// Environment variable that selects the backend.
pub const BACKEND_ENV: &str = "HOME_BACKEND";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Why a backend call did not go through.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("{backend} is not configured: {missing}")]
    NotConfigured { backend: String, missing: String },
    #[error("{backend} has no mapping for action '{action}'")]
    UnknownAction { backend: String, action: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("action queue for '{0}' is full")]
    Busy(String),
}

impl BackendError {
    pub fn not_configured(backend: &str, missing: impl Into<String>) -> Self {
        BackendError::NotConfigured {
            backend: backend.to_string(),
            missing: missing.into(),
        }
    }

    pub fn unknown_action(backend: &str, action: &str) -> Self {
        BackendError::UnknownAction {
            backend: backend.to_string(),
            action: action.to_string(),
        }
    }
}

/// Capability to execute a named action.
///
/// Implementations are called from executor worker threads and may block for
/// up to their request timeout.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, action: &str) -> Result<(), BackendError>;

    /// Report missing credentials without making a request.
    fn ensure_configured(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Supported backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Ifttt,
    HomeAssistant,
    GoogleSdm,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ifttt => "ifttt",
            BackendKind::HomeAssistant => "home_assistant",
            BackendKind::GoogleSdm => "google_sdm",
        }
    }

    /// Pick the backend from, in order, the command line, `HOME_BACKEND` and
    /// the config file. Unknown names fall back to IFTTT.
    pub fn resolve(cli: Option<&str>, env: Option<&str>, config: Option<&str>) -> BackendKind {
        let Some(name) = cli.or(env).or(config) else {
            return BackendKind::default();
        };

        name.parse().unwrap_or_else(|_| {
            tracing::warn!(backend = name, "Unknown backend, falling back to IFTTT");
            BackendKind::Ifttt
        })
    }

    /// [`resolve`](Self::resolve) with the environment read from the process.
    pub fn from_sources(cli: Option<&str>, config: Option<&str>) -> BackendKind {
        let env = std::env::var(BACKEND_ENV).ok();
        Self::resolve(cli, env.as_deref().filter(|v| !v.trim().is_empty()), config)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ifttt" => Ok(BackendKind::Ifttt),
            "home_assistant" | "homeassistant" | "ha" => Ok(BackendKind::HomeAssistant),
            "google_sdm" | "sdm" | "nest" => Ok(BackendKind::GoogleSdm),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// `backend:` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Backend name; `HOME_BACKEND` and `--backend` take precedence
    pub kind: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the selected backend from environment credentials.
///
/// Missing credentials are not an error here; they are logged and reported
/// by every `execute` call.
pub fn create_backend(
    kind: BackendKind,
    timeout: Duration,
) -> Result<Arc<dyn Backend>, BackendError> {
    let transport = Arc::new(HttpTransport::new(timeout)?);

    let backend: Arc<dyn Backend> = match kind {
        BackendKind::Ifttt => Arc::new(IftttBackend::from_env(transport)),
        BackendKind::HomeAssistant => Arc::new(HomeAssistantBackend::from_env(transport)),
        BackendKind::GoogleSdm => Arc::new(GoogleSdmBackend::from_env(transport)),
    };

    if let Err(e) = backend.ensure_configured() {
        tracing::warn!(backend = backend.name(), "{e}");
    }
    tracing::info!(backend = backend.name(), "Backend ready");
    Ok(backend)
}

/// Read a non-empty environment variable.
pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
