//! Home Assistant REST API backend.

use crate::backend::{env_var, Backend, BackendError, HttpTransport};
use std::collections::HashMap;
use std::sync::Arc;

pub const HA_BASE_URL_ENV: &str = "HA_BASE_URL";
pub const HA_TOKEN_ENV: &str = "HA_LONG_LIVED_TOKEN";
pub const DEFAULT_HA_BASE_URL: &str = "http://homeassistant.local:8123";

const CLIMATE: &str = "HA_CLIMATE_ENTITY";
const LIGHT: &str = "HA_LIGHT_ENTITY";
const MEDIA_PLAYER: &str = "HA_MEDIA_PLAYER_ENTITY";
const SCENE: &str = "HA_SCENE_ENTITY";

/// Service call for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceCall {
    pub domain: &'static str,
    pub service: &'static str,
    /// Environment variable holding the target entity id
    pub entity_env: &'static str,
}

const fn call(
    domain: &'static str,
    service: &'static str,
    entity_env: &'static str,
) -> ServiceCall {
    ServiceCall {
        domain,
        service,
        entity_env,
    }
}

pub fn service_for(action: &str) -> Option<ServiceCall> {
    let call = match action {
        "ac_toggle" => call("climate", "toggle", CLIMATE),
        "ac_on" => call("climate", "turn_on", CLIMATE),
        "ac_off" => call("climate", "turn_off", CLIMATE),
        // No setpoint entity is configured; these only make sure the unit runs.
        "ac_increase_temp" | "ac_decrease_temp" => call("climate", "turn_on", CLIMATE),
        "lights_on" => call("light", "turn_on", LIGHT),
        "lights_off" => call("light", "turn_off", LIGHT),
        "lights_toggle" => call("light", "toggle", LIGHT),
        "volume_up" => call("media_player", "volume_up", MEDIA_PLAYER),
        "volume_down" => call("media_player", "volume_down", MEDIA_PLAYER),
        "custom_scene" => call("scene", "turn_on", SCENE),
        _ => return None,
    };
    Some(call)
}

/// Connection settings and entity ids.
#[derive(Debug, Clone, Default)]
pub struct HomeAssistantConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// Entity ids keyed by their environment variable name
    pub entities: HashMap<&'static str, String>,
}

impl HomeAssistantConfig {
    pub fn from_env() -> Self {
        let base_url = env_var(HA_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_HA_BASE_URL.to_string());
        let entities = [CLIMATE, LIGHT, MEDIA_PLAYER, SCENE]
            .into_iter()
            .filter_map(|name| env_var(name).map(|id| (name, id)))
            .collect();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: env_var(HA_TOKEN_ENV),
            entities,
        }
    }
}

pub struct HomeAssistantBackend {
    transport: Arc<HttpTransport>,
    config: HomeAssistantConfig,
}

impl HomeAssistantBackend {
    pub fn new(transport: Arc<HttpTransport>, config: HomeAssistantConfig) -> Self {
        Self { transport, config }
    }

    pub fn from_env(transport: Arc<HttpTransport>) -> Self {
        Self::new(transport, HomeAssistantConfig::from_env())
    }

    pub fn service_url(&self, call: &ServiceCall) -> String {
        format!(
            "{}/api/services/{}/{}",
            self.config.base_url, call.domain, call.service
        )
    }
}

impl Backend for HomeAssistantBackend {
    fn name(&self) -> &str {
        "home_assistant"
    }

    fn ensure_configured(&self) -> Result<(), BackendError> {
        match self.config.token {
            Some(_) => Ok(()),
            None => Err(BackendError::not_configured(self.name(), HA_TOKEN_ENV)),
        }
    }

    fn execute(&self, action: &str) -> Result<(), BackendError> {
        let token = self
            .config
            .token
            .as_deref()
            .ok_or_else(|| BackendError::not_configured(self.name(), HA_TOKEN_ENV))?;
        let call = service_for(action)
            .ok_or_else(|| BackendError::unknown_action(self.name(), action))?;
        let entity_id = self
            .config
            .entities
            .get(call.entity_env)
            .ok_or_else(|| BackendError::not_configured(self.name(), call.entity_env))?;

        let body = serde_json::json!({ "entity_id": entity_id });
        self.transport
            .post_json(&self.service_url(&call), Some(token), Some(&body))?
            .into_result()?;

        tracing::info!(
            domain = call.domain,
            service = call.service,
            entity_id = %entity_id,
            "Home Assistant service called"
        );
        Ok(())
    }
}
