//! IFTTT Webhooks (Maker) backend.

use crate::backend::{env_var, Backend, BackendError, HttpTransport};
use std::sync::Arc;

pub const IFTTT_BASE_URL: &str = "https://maker.ifttt.com/trigger";
pub const IFTTT_KEY_ENV: &str = "IFTTT_WEBHOOK_KEY";

/// Event name for an action. Unmapped actions are sent as-is, so any applet
/// name can be used directly in the gesture config.
pub fn event_for(action: &str) -> &str {
    match action {
        "ac_increase_temp" => "ac_temp_up",
        "ac_decrease_temp" => "ac_temp_down",
        other => other,
    }
}

pub struct IftttBackend {
    transport: Arc<HttpTransport>,
    key: Option<String>,
    base_url: String,
}

impl IftttBackend {
    pub fn new(transport: Arc<HttpTransport>, key: Option<String>) -> Self {
        Self {
            transport,
            key,
            base_url: IFTTT_BASE_URL.to_string(),
        }
    }

    pub fn from_env(transport: Arc<HttpTransport>) -> Self {
        Self::new(transport, env_var(IFTTT_KEY_ENV))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn trigger_url(&self, event: &str, key: &str) -> String {
        format!("{}/{event}/with/key/{key}", self.base_url)
    }
}

impl Backend for IftttBackend {
    fn name(&self) -> &str {
        "ifttt"
    }

    fn ensure_configured(&self) -> Result<(), BackendError> {
        match self.key {
            Some(_) => Ok(()),
            None => Err(BackendError::not_configured(self.name(), IFTTT_KEY_ENV)),
        }
    }

    fn execute(&self, action: &str) -> Result<(), BackendError> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| BackendError::not_configured(self.name(), IFTTT_KEY_ENV))?;
        if action.trim().is_empty() {
            return Err(BackendError::unknown_action(self.name(), action));
        }

        let event = event_for(action);
        let body = serde_json::json!({});
        self.transport
            .post_json(&self.trigger_url(event, key), None, Some(&body))?
            .into_result()?;

        tracing::info!(event, "IFTTT event triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::http::test_server::serve;
    use std::time::Duration;

    fn transport() -> Arc<HttpTransport> {
        Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn test_event_mapping() {
        assert_eq!(event_for("ac_increase_temp"), "ac_temp_up");
        assert_eq!(event_for("ac_decrease_temp"), "ac_temp_down");
        assert_eq!(event_for("lights_toggle"), "lights_toggle");
        assert_eq!(event_for("my_applet"), "my_applet");
    }

    #[test]
    fn test_trigger_url() {
        let backend = IftttBackend::new(transport(), Some("k3y".to_string()));
        assert_eq!(
            backend.trigger_url("ac_temp_up", "k3y"),
            "https://maker.ifttt.com/trigger/ac_temp_up/with/key/k3y"
        );
    }

    #[test]
    fn test_missing_key_is_not_configured() {
        let backend = IftttBackend::new(transport(), None);
        assert!(matches!(
            backend.execute("lights_on"),
            Err(BackendError::NotConfigured { .. })
        ));
        assert!(backend.ensure_configured().is_err());
    }

    #[test]
    fn test_execute_posts_to_event() {
        let (base, server) = serve(vec![(200, "Congratulations!")]);
        let backend =
            IftttBackend::new(transport(), Some("k3y".to_string()))
                .with_base_url(format!("{base}/trigger"));

        backend.execute("ac_decrease_temp").unwrap();

        let request = server.join().unwrap().remove(0);
        assert!(request.starts_with("POST /trigger/ac_temp_down/with/key/k3y"));
    }

    #[test]
    fn test_rejected_request_is_server_error() {
        let (base, server) = serve(vec![(401, "bad key")]);
        let backend = IftttBackend::new(transport(), Some("nope".to_string())).with_base_url(base);

        let err = backend.execute("lights_on").unwrap_err();
        assert!(matches!(err, BackendError::Server { status: 401, .. }));
        server.join().unwrap();
    }
}
