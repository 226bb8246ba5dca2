//! Stores holding client-visible state.
//!
//! State is mutated only through store methods; fields are private and
//! accessors hand out clones. Real-time pushes and REST responses for
//! the same entity can race — the stores tolerate this by making the
//! next full fetch the source of truth (eventual consistency via
//! refetch, not strict ordering).

mod chat;
mod notifications;
mod presence;

pub use chat::{ChatError, ChatStore};
pub use notifications::{NotificationError, NotificationStore};
pub use presence::PresenceStore;

/// Outcome of a store mutation that pairs a local update with a server
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Local and server state both updated.
    Confirmed,
    /// Local state updated; the server write was dispatched without
    /// waiting for its outcome. The next full fetch reconciles.
    LocalOnly,
}
