//! Notification store: server-fetched snapshots reconciled with
//! real-time pushes.
//!
//! Mark-read and delete are optimistic with fire-and-forget server
//! writes; the inconsistency window is bounded by the next
//! `fetch_notifications`, which replaces local state wholesale.
//! Clear-all is the one destructive path and requires a server
//! acknowledgment before local state changes.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use ridelink_shared::{ApiError, Notification};

use crate::api::Api;
use crate::lock;
use crate::realtime::RealtimeClient;
use crate::ws::{RealtimeEvent, Subscription};

use super::MutationOutcome;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// The server processed clear-all but reported `success: false`.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Default)]
struct NotificationState {
    notifications: Vec<Notification>,
    unread_count: usize,
    is_loading: bool,
    error: Option<String>,
}

impl NotificationState {
    /// Prepend a pushed notification and count it unread. Returns false
    /// if the identifier is already present.
    fn add(&mut self, notification: Notification) -> bool {
        if self.notifications.iter().any(|n| n.id == notification.id) {
            return false;
        }
        if !notification.read {
            self.unread_count += 1;
        }
        self.notifications.insert(0, notification);
        true
    }
}

/// Client-visible notification list and unread count.
pub struct NotificationStore {
    api: Arc<dyn Api>,
    state: Arc<Mutex<NotificationState>>,
}

impl NotificationStore {
    pub fn new(api: Arc<dyn Api>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(NotificationState::default())),
        }
    }

    /// Replace the local list with the server's snapshot and recompute
    /// the unread count.
    ///
    /// No-ops if a fetch is already in flight (rapid UI re-renders must
    /// not cause request storms). HTTP 429 is swallowed — logged, no
    /// error state, no self-scheduled retry; the next triggered fetch
    /// is the retry. Other failures set a recoverable error message.
    pub async fn fetch_notifications(&self) {
        {
            let mut state = lock(&self.state);
            if state.is_loading {
                tracing::debug!("notification fetch already in flight, skipping");
                return;
            }
            state.is_loading = true;
            state.error = None;
        }
        self.do_fetch().await;
    }

    /// Force a reconciliation fetch, bypassing the in-flight guard.
    /// The documented recovery point for optimistic mutations.
    pub async fn resync(&self) {
        {
            let mut state = lock(&self.state);
            state.is_loading = true;
            state.error = None;
        }
        self.do_fetch().await;
    }

    async fn do_fetch(&self) {
        let result = self.api.notifications().await;

        let mut state = lock(&self.state);
        state.is_loading = false;
        match result {
            Ok(list) => {
                state.unread_count = list.iter().filter(|n| !n.read).count();
                state.notifications = list;
            }
            Err(e) if e.is_rate_limited() => {
                tracing::debug!("notification fetch rate limited: {e}");
            }
            Err(e) => {
                tracing::warn!("notification fetch failed: {e}");
                state.error = Some(e.server_message());
            }
        }
    }

    /// Optimistically mark one notification read; the server write is
    /// dispatched without waiting and failures are only logged. `read`
    /// never reverts locally.
    pub fn mark_as_read(&self, id: &str) -> MutationOutcome {
        {
            let mut state = lock(&self.state);
            if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
                if !n.read {
                    n.read = true;
                    state.unread_count = state.unread_count.saturating_sub(1);
                }
            }
        }

        let api = self.api.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.mark_notification_read(&id).await {
                tracing::warn!("mark-read failed for {id}: {e}");
            }
        });
        MutationOutcome::LocalOnly
    }

    /// Optimistically mark every notification read.
    pub fn mark_all_as_read(&self) -> MutationOutcome {
        {
            let mut state = lock(&self.state);
            for n in &mut state.notifications {
                n.read = true;
            }
            state.unread_count = 0;
        }

        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.mark_all_notifications_read().await {
                tracing::warn!("mark-all-read failed: {e}");
            }
        });
        MutationOutcome::LocalOnly
    }

    /// Remove a notification locally and dispatch the server delete.
    pub fn delete_notification(&self, id: &str) -> MutationOutcome {
        {
            let mut state = lock(&self.state);
            if let Some(pos) = state.notifications.iter().position(|n| n.id == id) {
                let removed = state.notifications.remove(pos);
                if !removed.read {
                    state.unread_count = state.unread_count.saturating_sub(1);
                }
            }
        }

        let api = self.api.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.delete_notification(&id).await {
                tracing::warn!("delete failed for {id}: {e}");
            }
        });
        MutationOutcome::LocalOnly
    }

    /// Delete all notifications.
    ///
    /// Not optimistic: the operation is irreversible, so local state is
    /// only cleared after the server acknowledges with `success: true`.
    /// On failure the list is untouched and a user-visible error is set.
    pub async fn clear_all(&self) -> Result<MutationOutcome, NotificationError> {
        match self.api.clear_notifications().await {
            Ok(resp) if resp.success => {
                let mut state = lock(&self.state);
                state.notifications.clear();
                state.unread_count = 0;
                state.error = None;
                Ok(MutationOutcome::Confirmed)
            }
            Ok(resp) => {
                let message = resp
                    .message
                    .unwrap_or_else(|| "failed to clear notifications".to_string());
                lock(&self.state).error = Some(message.clone());
                Err(NotificationError::Rejected(message))
            }
            Err(e) => {
                lock(&self.state).error = Some(e.server_message());
                Err(NotificationError::Api(e))
            }
        }
    }

    /// Accept a real-time push: prepend and count it unread. Returns
    /// false if the identifier is already present.
    pub fn add_notification(&self, notification: Notification) -> bool {
        lock(&self.state).add(notification)
    }

    /// Register this store for `new-notification` pushes. Dropping the
    /// guard unsubscribes.
    pub fn subscribe(&self, realtime: &RealtimeClient) -> Subscription {
        let state = self.state.clone();
        realtime.subscribe("new-notification", move |event| {
            if let RealtimeEvent::NewNotification(n) = event {
                lock(&state).add(n.clone());
            }
        })
    }

    // --- accessors ---

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.state).notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        lock(&self.state).unread_count
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }
}
