//! Chat store: per-conversation message lists merging real-time pushes
//! with paginated history fetches.
//!
//! Messages are keyed by counterpart and kept sorted by creation time;
//! a message arriving twice (push first, history fetch later) is
//! deduplicated by identifier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use ridelink_shared::{
    ApiError, ChatRoom, ClientEvent, Message, SendMessageRequest, UserSummary, MAX_MESSAGE_LEN,
    MESSAGES_PAGE_SIZE,
};

use crate::api::Api;
use crate::lock;
use crate::realtime::RealtimeClient;
use crate::ws::{RealtimeEvent, Subscription};

use super::MutationOutcome;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message content must not be empty")]
    EmptyContent,
    #[error("message content exceeds {MAX_MESSAGE_LEN} characters")]
    ContentTooLong,
    /// Send failed server-side; carries the server's message or a
    /// generic fallback for the UI to display.
    #[error("{0}")]
    Send(String),
}

/// Messages exchanged with a single counterpart.
#[derive(Debug, Default)]
struct Conversation {
    /// Sorted by created_at ascending.
    messages: Vec<Message>,
    history_loaded: bool,
    /// Last history page fetched (1-based); 0 = none yet.
    page: u32,
    has_more: bool,
    load_in_flight: bool,
}

impl Conversation {
    /// Insert keeping creation order. Returns false when the id is
    /// already present.
    fn add_message(&mut self, msg: Message) -> bool {
        if self.messages.iter().any(|m| m.id == msg.id) {
            return false;
        }
        let pos = self
            .messages
            .binary_search_by(|m| m.created_at.cmp(&msg.created_at))
            .unwrap_or_else(|pos| pos);
        self.messages.insert(pos, msg);
        true
    }
}

#[derive(Default)]
struct ChatState {
    rooms: Vec<ChatRoom>,
    conversations: HashMap<String, Conversation>,
}

impl ChatState {
    /// Fold a pushed message into the sender's conversation and bump
    /// the room preview. Duplicates (by id) change nothing.
    fn accept_incoming(&mut self, msg: Message) {
        let counterpart = msg.sender_id.clone();
        let added = self
            .conversations
            .entry(counterpart.clone())
            .or_default()
            .add_message(msg.clone());
        if !added {
            return;
        }
        if let Some(room) = self.rooms.iter_mut().find(|r| r.user.id == counterpart) {
            room.last_message = Some(msg);
            room.unread_count = room.unread_count.saturating_add(1);
        }
    }
}

/// Conversation list and per-counterpart message history.
pub struct ChatStore {
    api: Arc<dyn Api>,
    realtime: Arc<RealtimeClient>,
    state: Arc<Mutex<ChatState>>,
    current_user: Mutex<Option<UserSummary>>,
}

impl ChatStore {
    pub fn new(api: Arc<dyn Api>, realtime: Arc<RealtimeClient>) -> Self {
        Self {
            api,
            realtime,
            state: Arc::new(Mutex::new(ChatState::default())),
            current_user: Mutex::new(None),
        }
    }

    /// Identity used as the `sender` of outgoing broadcasts.
    pub fn set_current_user(&self, user: UserSummary) {
        *lock(&self.current_user) = Some(user);
    }

    /// Write-through send: the server's canonical message object (not a
    /// locally constructed one) is appended, then broadcast so the
    /// recipient's open session updates without a refetch. Local state
    /// is unchanged on failure.
    pub async fn send_message(
        &self,
        receiver_id: &str,
        content: &str,
        ride_id: Option<String>,
    ) -> Result<Message, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }
        if content.chars().count() > MAX_MESSAGE_LEN {
            return Err(ChatError::ContentTooLong);
        }

        let req = SendMessageRequest {
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            ride_id,
            booking_id: None,
        };
        let message = self
            .api
            .send_message(&req)
            .await
            .map_err(|e| ChatError::Send(e.server_message()))?;

        {
            let mut state = lock(&self.state);
            state
                .conversations
                .entry(receiver_id.to_string())
                .or_default()
                .add_message(message.clone());
        }

        if let Some(sender) = lock(&self.current_user).clone() {
            self.realtime.emit(&ClientEvent::SendMessage {
                receiver_id: receiver_id.to_string(),
                message: message.clone(),
                sender,
            });
        } else {
            tracing::debug!("no current user set, skipping send-message broadcast");
        }

        Ok(message)
    }

    /// Fetch the first history page for a conversation and merge it
    /// (dedupe by id) with whatever real-time pushes already delivered.
    /// Returns the merged, ordered list.
    pub async fn fetch_messages(&self, counterpart_id: &str) -> Result<Vec<Message>, ApiError> {
        let fetched = self.api.conversation(counterpart_id, 1).await?;

        let mut state = lock(&self.state);
        let conv = state
            .conversations
            .entry(counterpart_id.to_string())
            .or_default();
        conv.has_more = fetched.len() >= MESSAGES_PAGE_SIZE;
        for msg in fetched {
            conv.add_message(msg);
        }
        conv.history_loaded = true;
        conv.page = conv.page.max(1);
        Ok(conv.messages.clone())
    }

    /// Load the next (older) history page. Concurrent triggers are
    /// suppressed by an in-flight guard; older messages are prepended
    /// by sort order, never replacing the in-memory tail.
    pub async fn load_older(&self, counterpart_id: &str) -> Result<(), ApiError> {
        let next_page = {
            let mut state = lock(&self.state);
            let conv = state
                .conversations
                .entry(counterpart_id.to_string())
                .or_default();
            if conv.load_in_flight || (conv.history_loaded && !conv.has_more) {
                return Ok(());
            }
            conv.load_in_flight = true;
            conv.page + 1
        };

        let result = self.api.conversation(counterpart_id, next_page).await;

        let mut state = lock(&self.state);
        let conv = state
            .conversations
            .entry(counterpart_id.to_string())
            .or_default();
        conv.load_in_flight = false;
        match result {
            Ok(older) => {
                conv.has_more = older.len() >= MESSAGES_PAGE_SIZE;
                conv.page = next_page;
                for msg in older {
                    conv.add_message(msg);
                }
                conv.history_loaded = true;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("load-older failed for {counterpart_id}: {e}");
                Err(e)
            }
        }
    }

    /// Fetch conversation summaries, replacing the local room list.
    pub async fn fetch_chat_rooms(&self) -> Result<(), ApiError> {
        let rooms = self.api.conversations().await?;
        lock(&self.state).rooms = rooms;
        Ok(())
    }

    /// Optimistically flip a message's read flag; the server write is
    /// dispatched without waiting. Independent of notification read
    /// state.
    pub fn mark_as_read(&self, message_id: &str) -> MutationOutcome {
        {
            let mut state = lock(&self.state);
            for conv in state.conversations.values_mut() {
                if let Some(msg) = conv.messages.iter_mut().find(|m| m.id == message_id) {
                    msg.read = true;
                    break;
                }
            }
        }

        let api = self.api.clone();
        let id = message_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.mark_message_read(&id).await {
                tracing::warn!("message mark-read failed for {id}: {e}");
            }
        });
        MutationOutcome::LocalOnly
    }

    /// Register for inbound message pushes addressed to `user_id`.
    ///
    /// Appends to the sender's conversation when not already present
    /// (dedupe by id) and updates the room preview. Hold the returned
    /// guard for the lifetime of the chat view; dropping it
    /// unsubscribes, so handlers cannot accumulate across remounts.
    pub fn subscribe_to_messages(&self, user_id: &str) -> Subscription {
        let state = self.state.clone();
        let user_id = user_id.to_string();
        self.realtime.subscribe("new-message", move |event| {
            let RealtimeEvent::NewMessage(msg) = event else {
                return;
            };
            // Our own sends come back through the write-through path.
            if msg.receiver_id != user_id {
                return;
            }
            lock(&state).accept_incoming(msg.clone());
        })
    }

    /// Emit a typing indicator for the counterpart.
    pub fn set_typing(&self, receiver_id: &str, typing: bool) {
        let event = if typing {
            ClientEvent::TypingStart {
                receiver_id: receiver_id.to_string(),
            }
        } else {
            ClientEvent::TypingStop {
                receiver_id: receiver_id.to_string(),
            }
        };
        self.realtime.emit(&event);
    }

    // --- accessors ---

    /// Messages exchanged with a counterpart, creation order ascending.
    pub fn messages_with(&self, counterpart_id: &str) -> Vec<Message> {
        lock(&self.state)
            .conversations
            .get(counterpart_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn rooms(&self) -> Vec<ChatRoom> {
        lock(&self.state).rooms.clone()
    }

    /// Sum of per-conversation unread counts.
    pub fn unread_total(&self) -> u32 {
        lock(&self.state)
            .rooms
            .iter()
            .map(|r| r.unread_count)
            .sum()
    }
}
