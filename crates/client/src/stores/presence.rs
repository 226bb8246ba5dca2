//! Presence store tracking which users are currently online.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::lock;
use crate::realtime::RealtimeClient;
use crate::ws::{RealtimeEvent, Subscription};

/// Online-user set fed by `user-online`/`user-offline` events.
#[derive(Default)]
pub struct PresenceStore {
    online: Arc<Mutex<HashSet<String>>>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, user_id: &str, online: bool) {
        let mut set = lock(&self.online);
        if online {
            set.insert(user_id.to_string());
        } else {
            set.remove(user_id);
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        lock(&self.online).contains(user_id)
    }

    /// Forget all presence data (on logout/disconnect).
    pub fn clear(&self) {
        lock(&self.online).clear();
    }

    /// Register for presence events. Dropping the guards unsubscribes.
    pub fn subscribe(&self, realtime: &RealtimeClient) -> Vec<Subscription> {
        let set = self.online.clone();
        let online = realtime.subscribe("user-online", move |event| {
            if let RealtimeEvent::UserOnline(user_id) = event {
                lock(&set).insert(user_id.clone());
            }
        });

        let set = self.online.clone();
        let offline = realtime.subscribe("user-offline", move |event| {
            if let RealtimeEvent::UserOffline(user_id) = event {
                lock(&set).remove(user_id);
            }
        });

        vec![online, offline]
    }
}
