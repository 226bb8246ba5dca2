//! Event router: normalizes raw inbound payloads into typed events and
//! fans them out to registered handlers.
//!
//! Payload ambiguity stops here: a `new-notification` push may arrive
//! as a full record or a minimal descriptor, and the router collapses
//! both into a canonical `Notification` before any handler runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ridelink_shared::{Message, NewMessagePayload, Notification, NotificationPush, RawEnvelope};

use crate::lock;

/// Typed local event delivered to handlers.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    NewMessage(Message),
    NewNotification(Notification),
    UserOnline(String),
    UserOffline(String),
}

impl RealtimeEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::NewMessage(_) => "new-message",
            RealtimeEvent::NewNotification(_) => "new-notification",
            RealtimeEvent::UserOnline(_) => "user-online",
            RealtimeEvent::UserOffline(_) => "user-offline",
        }
    }
}

/// Opaque handle identifying one registered handler.
pub type HandlerId = u64;

type Handler = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Registry of inbound-event handlers keyed by wire event name.
///
/// Multiple handlers per event are permitted; no ordering is guaranteed
/// between handlers for the same event.
#[derive(Default)]
pub struct EventRouter {
    handlers: Mutex<HashMap<String, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
    /// Connected user, used to fill in descriptor pushes.
    owner: Mutex<Option<String>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a named inbound event.
    pub fn on(
        &self,
        event: &str,
        handler: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers)
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler. Unknown ids are a no-op.
    pub fn off(&self, event: &str, id: HandlerId) {
        if let Some(entries) = lock(&self.handlers).get_mut(event) {
            entries.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    pub(crate) fn set_owner(&self, owner: Option<String>) {
        *lock(&self.owner) = owner;
    }

    /// Decode and dispatch one raw transport frame.
    pub(crate) fn route_frame(&self, text: &str) {
        match serde_json::from_str::<RawEnvelope>(text) {
            Ok(envelope) => self.route(&envelope.event, envelope.data),
            Err(e) => tracing::warn!("failed to parse inbound frame: {e}"),
        }
    }

    /// Normalize a raw payload and invoke every handler registered for
    /// `event`. Unknown event names are ignored, not errors.
    pub fn route(&self, event: &str, data: serde_json::Value) {
        let normalized = match event {
            "new-message" => serde_json::from_value::<NewMessagePayload>(data)
                .map(|payload| RealtimeEvent::NewMessage(payload.message)),
            "new-notification" => {
                serde_json::from_value::<NotificationPush>(data).map(|push| {
                    let owner = lock(&self.owner).clone().unwrap_or_default();
                    RealtimeEvent::NewNotification(push.into_notification(&owner))
                })
            }
            "user-online" => {
                serde_json::from_value::<String>(data).map(RealtimeEvent::UserOnline)
            }
            "user-offline" => {
                serde_json::from_value::<String>(data).map(RealtimeEvent::UserOffline)
            }
            other => {
                tracing::debug!(event = other, "ignoring unknown event");
                return;
            }
        };

        match normalized {
            Ok(typed) => self.dispatch(&typed),
            Err(e) => tracing::warn!(event, "failed to decode payload: {e}"),
        }
    }

    fn dispatch(&self, event: &RealtimeEvent) {
        // Clone handlers out so a handler may re-enter the router.
        let handlers: Vec<Handler> = lock(&self.handlers)
            .get(event.name())
            .map(|entries| entries.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(event);
        }
    }
}

/// RAII deregistration guard for a router handler. Dropping it removes
/// the handler, so duplicate handlers cannot accumulate across view
/// remounts.
pub struct Subscription {
    router: Arc<EventRouter>,
    event: String,
    id: HandlerId,
}

impl Subscription {
    pub(crate) fn new(router: Arc<EventRouter>, event: String, id: HandlerId) -> Self {
        Self { router, event, id }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.router.off(&self.event, self.id);
    }
}
