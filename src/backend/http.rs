//! Shared HTTP transport for backends.
//!
//! Requests go through an async `reqwest` client driven by a private tokio
//! runtime, so backends can expose a plain blocking `execute`.

use crate::backend::BackendError;
use serde::Serialize;
use std::time::Duration;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx reply into `BackendError::Server`.
    pub fn into_result(self) -> Result<HttpReply, BackendError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(BackendError::Server {
                status: self.status,
                message: truncate(&self.body, 200),
            })
        }
    }
}

/// Blocking facade over an async HTTP client.
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        // Several executor workers may block on requests at the same time.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("gesture-home-http")
            .enable_all()
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create runtime: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gesture-home/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            runtime,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a JSON body (or nothing) with an optional bearer token.
    pub fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: Option<&B>,
    ) -> Result<HttpReply, BackendError> {
        let mut request = self.client.post(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        self.runtime.block_on(self.send(request))
    }

    /// POST a form-encoded body.
    pub fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, BackendError> {
        let request = self.client.post(url).form(form);
        self.runtime.block_on(self.send(request))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<HttpReply, BackendError> {
        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        Ok(HttpReply { status, body })
    }

    fn map_error(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::Network(error.to_string())
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_server::{serve, stall};
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_post_json_sends_bearer_and_body() {
        let (base, server) = serve(vec![(201, "{}")]);
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();

        let body = serde_json::json!({"entity_id": "light.kitchen"});
        let reply = transport
            .post_json(&format!("{base}/api/services/light/toggle"), Some("secret"), Some(&body))
            .unwrap();
        assert_eq!(reply.status, 201);
        assert!(reply.is_success());

        let request = server.join().unwrap().remove(0);
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /api/services/light/toggle"));
        assert!(lower.contains("authorization: bearer secret"));
        assert!(request.contains("light.kitchen"));
    }

    #[test]
    fn test_post_form_encodes_pairs() {
        let (base, server) = serve(vec![(200, "{\"access_token\":\"t\"}")]);
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();

        let reply = transport
            .post_form(&format!("{base}/token"), &[("grant_type", "refresh_token")])
            .unwrap();
        assert!(reply.body.contains("access_token"));

        let request = server.join().unwrap().remove(0);
        assert!(request.contains("grant_type=refresh_token"));
    }

    #[test]
    fn test_error_status_maps_to_server_error() {
        let reply = HttpReply {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(
            reply.into_result(),
            Err(BackendError::Server {
                status: 503,
                message: "unavailable".to_string()
            })
        );
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let result = transport.post_json::<()>(&format!("http://127.0.0.1:{port}/"), None, None);
        assert!(matches!(result, Err(BackendError::Network(_))));
    }

    #[test]
    fn test_unanswered_request_times_out() {
        let (base, server) = stall(Duration::from_secs(3));
        let transport = HttpTransport::new(Duration::from_millis(300)).unwrap();

        let started = Instant::now();
        let result = transport.post_json::<()>(&format!("{base}/trigger"), None, None);
        let elapsed = started.elapsed();

        assert_eq!(result, Err(BackendError::Timeout(Duration::from_millis(300))));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
        server.join().unwrap();
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(300);
        let cut = truncate(&long, 200);
        assert_eq!(cut.len(), 203);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate(" short ", 200), "short");
    }
}
