//! Realtime transport: connection state, bounded reconnect policy,
//! the pluggable connector, and the inbound event router.
//!
//! The connection loop hides reconnection from callers entirely: no
//! transport failure surfaces as an error, only as a state transition
//! observable through [`crate::RealtimeClient::watch_state`].

use std::time::Duration;

mod connection;
mod router;

pub use connection::{Connector, WsConnector, WsSink, WsSource};
pub use router::{EventRouter, HandlerId, RealtimeEvent, Subscription};

pub(crate) use connection::run_connection;

/// Connection state for the realtime transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts before giving up. Once
    /// exceeded, the state becomes `Failed` and only an explicit
    /// `connect()` resumes.
    pub max_attempts: u32,
    /// Base delay; reconnect attempt `n` waits `n` times this long.
    pub base_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}
