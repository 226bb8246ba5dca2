//! Ridelink client - realtime synchronization for the ridesharing
//! marketplace.
//!
//! This crate owns the client side of the marketplace's realtime
//! subsystem: a single persistent transport connection with bounded
//! auto-reconnect, an event router that normalizes inbound pushes, and
//! stores that reconcile server-fetched snapshots with real-time events
//! (notifications, chat, presence), plus the payment-status poller.
//!
//! The transport client is an explicitly constructed instance, not a
//! module-level singleton: build one [`RealtimeClient`] per process and
//! share it (`Arc`) across stores.

pub mod api;
pub mod config;
pub mod logging;
pub mod payments;
pub mod realtime;
pub mod stores;
pub mod ws;

pub use api::{Api, ApiClient};
pub use config::ClientConfig;
pub use realtime::RealtimeClient;
pub use stores::{ChatError, ChatStore, MutationOutcome, NotificationStore, PresenceStore};
pub use ws::{ConnectionState, ReconnectConfig};

/// Lock a mutex, recovering the inner value if a panicking thread
/// poisoned it. Store state stays usable either way.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
