//! Realtime client facade: one logical connection, reconnection hidden
//! from callers, publish/subscribe primitives.

use std::sync::{Arc, Mutex};

use futures_channel::mpsc::{unbounded, UnboundedSender};
use tokio::sync::watch;

use ridelink_shared::ClientEvent;

use crate::config::ClientConfig;
use crate::lock;
use crate::ws::{
    run_connection, ConnectionState, Connector, EventRouter, HandlerId, RealtimeEvent,
    Subscription, WsConnector,
};

/// Client for the server's realtime channel.
///
/// Construct one instance per process and share it (`Arc`) across the
/// stores; the instance enforces "at most one live connection"
/// internally. There is deliberately no module-level singleton — the
/// instance is injected wherever it is needed, which also makes the
/// transport mockable through [`Connector`].
pub struct RealtimeClient {
    connector: Arc<dyn Connector>,
    router: Arc<EventRouter>,
    config: ClientConfig,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    user_id: Option<String>,
    sender: Option<UnboundedSender<String>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl RealtimeClient {
    /// Client with the production WebSocket connector.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Client with an injected transport, for tests and embedding.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            router: Arc::new(EventRouter::new()),
            config,
            state_tx,
            state_rx,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Establish the transport for `user_id`.
    ///
    /// Idempotent: if a connection is already live (or being
    /// established), the call returns without side effects. Never
    /// fails synchronously — a refused handshake degrades into the
    /// bounded reconnect loop, observable through [`Self::watch_state`].
    pub fn connect(&self, user_id: &str) {
        let mut inner = lock(&self.inner);
        let state = self.state_rx.borrow().clone();

        if inner.sender.is_some() && !matches!(state, ConnectionState::Failed { .. }) {
            tracing::debug!(user = user_id, "connect: connection already active");
            return;
        }

        // Stop a failed loop before starting a fresh one.
        if let Some(shutdown) = inner.shutdown.take() {
            let _ = shutdown.send(true);
        }

        let (tx, rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        inner.user_id = Some(user_id.to_string());
        inner.sender = Some(tx);
        inner.shutdown = Some(shutdown_tx);
        self.router.set_owner(Some(user_id.to_string()));

        tokio::spawn(run_connection(
            self.connector.clone(),
            self.router.clone(),
            self.config.reconnect.clone(),
            self.handshake_url(user_id),
            user_id.to_string(),
            self.state_tx.clone(),
            Arc::new(tokio::sync::Mutex::new(rx)),
            shutdown_rx,
        ));
    }

    /// Tear down the transport and clear the session. Safe to call when
    /// not connected.
    pub fn disconnect(&self) {
        let mut inner = lock(&self.inner);
        if let Some(shutdown) = inner.shutdown.take() {
            let _ = shutdown.send(true);
        }
        inner.sender = None;
        inner.user_id = None;
        self.router.set_owner(None);
        let _ = self.state_tx.send(ConnectionState::Disconnected);
    }

    /// Send an event if connected; otherwise drop it with a warning.
    ///
    /// At-most-once: there is no send queue, so callers must not assume
    /// delivery.
    pub fn emit(&self, event: &ClientEvent) {
        let inner = lock(&self.inner);
        if !self.state_rx.borrow().is_connected() {
            tracing::warn!(event = event.name(), "emit while disconnected, dropping");
            return;
        }
        let Some(sender) = &inner.sender else {
            tracing::warn!(event = event.name(), "emit without a session, dropping");
            return;
        };
        match serde_json::to_string(event) {
            Ok(frame) => {
                if sender.unbounded_send(frame).is_err() {
                    tracing::warn!(event = event.name(), "connection task gone, dropping");
                }
            }
            Err(e) => tracing::error!("failed to encode event: {e}"),
        }
    }

    pub fn join_room(&self, room: &str) {
        self.emit(&ClientEvent::JoinRoom(room.to_string()));
    }

    pub fn leave_room(&self, room: &str) {
        self.emit(&ClientEvent::LeaveRoom(room.to_string()));
    }

    /// Register a handler for a named inbound event.
    pub fn on(
        &self,
        event: &str,
        handler: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.router.on(event, handler)
    }

    /// Unregister a handler registered with [`Self::on`].
    pub fn off(&self, event: &str, id: HandlerId) {
        self.router.off(event, id);
    }

    /// Like [`Self::on`], but returns an RAII guard that unregisters on
    /// drop.
    pub fn subscribe(
        &self,
        event: &str,
        handler: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.router.on(event, handler);
        Subscription::new(self.router.clone(), event.to_string(), id)
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Observe connection-state transitions without polling.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    pub fn user_id(&self) -> Option<String> {
        lock(&self.inner).user_id.clone()
    }

    fn handshake_url(&self, user_id: &str) -> String {
        match url::Url::parse(&self.config.ws_url) {
            Ok(mut parsed) => {
                {
                    let mut pairs = parsed.query_pairs_mut();
                    pairs.append_pair("userId", user_id);
                    if let Some(token) = &self.config.bearer_token {
                        pairs.append_pair("token", token);
                    }
                }
                parsed.to_string()
            }
            Err(e) => {
                tracing::warn!(url = %self.config.ws_url, "invalid ws url: {e}");
                self.config.ws_url.clone()
            }
        }
    }
}
