//! Client configuration from explicit values or environment variables.

use crate::ws::ReconnectConfig;

/// Connection settings shared by the REST client and the realtime
/// transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for REST calls, e.g. `https://api.ridelink.example/api`.
    pub api_base: String,
    /// Realtime endpoint, e.g. `wss://api.ridelink.example/ws`.
    pub ws_url: String,
    /// Bearer credential attached to REST calls and the transport
    /// handshake. A missing token is not an error; unauthenticated
    /// requests surface as ordinary HTTP failures.
    pub bearer_token: Option<String>,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:5000/api".to_string(),
            ws_url: "ws://localhost:5000/ws".to_string(),
            bearer_token: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Build a configuration from environment variables.
    ///
    /// - `RIDELINK_API_BASE`: REST base URL
    /// - `RIDELINK_WS_URL`: realtime endpoint
    /// - `RIDELINK_TOKEN`: bearer credential
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: std::env::var("RIDELINK_API_BASE").unwrap_or(defaults.api_base),
            ws_url: std::env::var("RIDELINK_WS_URL").unwrap_or(defaults.ws_url),
            bearer_token: std::env::var("RIDELINK_TOKEN").ok(),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}
