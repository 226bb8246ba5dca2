//! Scripted test doubles for the REST API and the realtime transport.

// Each test binary compiles its own copy; not every binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::SinkExt;

use ridelink_client::api::Api;
use ridelink_client::ws::{Connector, WsSink, WsSource};
use ridelink_shared::{
    ApiError, ChatRoom, ClearAllResponse, Message, Notification, NotificationKind, PaymentRecord,
    PaymentStatus, SendMessageRequest, TransportError,
};

// --- fixtures ---

pub fn notification(id: &str, read: bool) -> Notification {
    Notification {
        id: id.to_string(),
        user_id: "u1".to_string(),
        kind: NotificationKind::BookingRequest,
        title: format!("notification {id}"),
        message: "a rider wants a seat".to_string(),
        data: serde_json::Value::Null,
        read,
        action_url: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
    }
}

pub fn message(id: &str, sender: &str, receiver: &str, ts_secs: i64) -> Message {
    Message {
        id: id.to_string(),
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        ride_id: None,
        booking_id: None,
        content: format!("message {id}"),
        read: false,
        created_at: Utc.timestamp_opt(ts_secs, 0).unwrap(),
    }
}

pub fn room(counterpart: &str) -> ChatRoom {
    ChatRoom {
        user: ridelink_shared::UserSummary {
            id: counterpart.to_string(),
            name: format!("user {counterpart}"),
            avatar: None,
        },
        last_message: None,
        unread_count: 0,
    }
}

/// Poll a condition while letting spawned tasks (and the paused clock)
/// make progress.
pub async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

// --- scripted API ---

pub struct MockApi {
    pub notifications_response: Mutex<Result<Vec<Notification>, ApiError>>,
    /// Artificial latency for `notifications`, for in-flight-guard tests.
    pub notifications_delay: Mutex<Option<Duration>>,
    pub notifications_calls: AtomicUsize,

    pub clear_response: Mutex<Result<ClearAllResponse, ApiError>>,

    pub conversation_pages: Mutex<HashMap<u32, Vec<Message>>>,
    pub conversation_delay: Mutex<Option<Duration>>,
    pub conversation_calls: AtomicUsize,

    pub send_response: Mutex<Result<Message, ApiError>>,
    pub send_calls: AtomicUsize,

    pub mark_notification_read_calls: AtomicUsize,
    pub mark_message_read_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,

    pub rooms_response: Mutex<Result<Vec<ChatRoom>, ApiError>>,

    /// Statuses returned by successive `payment` calls; the last one
    /// repeats once the script is exhausted.
    pub payment_statuses: Mutex<Vec<PaymentStatus>>,
    pub payment_calls: AtomicUsize,
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            notifications_response: Mutex::new(Ok(Vec::new())),
            notifications_delay: Mutex::new(None),
            notifications_calls: AtomicUsize::new(0),
            clear_response: Mutex::new(Ok(ClearAllResponse {
                success: true,
                message: None,
            })),
            conversation_pages: Mutex::new(HashMap::new()),
            conversation_delay: Mutex::new(None),
            conversation_calls: AtomicUsize::new(0),
            send_response: Mutex::new(Ok(message("srv-1", "u1", "u2", 100))),
            send_calls: AtomicUsize::new(0),
            mark_notification_read_calls: AtomicUsize::new(0),
            mark_message_read_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            rooms_response: Mutex::new(Ok(Vec::new())),
            payment_statuses: Mutex::new(vec![PaymentStatus::Pending]),
            payment_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Api for MockApi {
    async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.notifications_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.notifications_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.notifications_response.lock().unwrap().clone()
    }

    async fn mark_notification_read(&self, _id: &str) -> Result<(), ApiError> {
        self.mark_notification_read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn delete_notification(&self, _id: &str) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_notifications(&self) -> Result<ClearAllResponse, ApiError> {
        self.clear_response.lock().unwrap().clone()
    }

    async fn conversation(&self, _user_id: &str, page: u32) -> Result<Vec<Message>, ApiError> {
        self.conversation_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.conversation_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .conversation_pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, _req: &SendMessageRequest) -> Result<Message, ApiError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.send_response.lock().unwrap().clone()
    }

    async fn mark_message_read(&self, _id: &str) -> Result<(), ApiError> {
        self.mark_message_read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn conversations(&self) -> Result<Vec<ChatRoom>, ApiError> {
        self.rooms_response.lock().unwrap().clone()
    }

    async fn payment(&self, id: &str) -> Result<PaymentRecord, ApiError> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.payment_statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.remove(0)
        } else {
            statuses.first().copied().unwrap_or(PaymentStatus::Pending)
        };
        Ok(PaymentRecord {
            id: id.to_string(),
            status,
        })
    }
}

// --- scripted transport ---

enum Script {
    AlwaysFail,
    Succeed,
}

/// One accepted connection: what the client sent, and a handle to feed
/// it inbound frames (or sever the link by closing the channel).
pub struct MockSession {
    pub outbound: UnboundedReceiver<String>,
    pub inbound: UnboundedSender<Result<String, TransportError>>,
}

impl MockSession {
    pub fn drain_outbound(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = self.outbound.try_next() {
            frames.push(frame);
        }
        frames
    }

    /// Simulate a server-side disconnect.
    pub fn sever(&mut self) {
        self.inbound.close_channel();
    }
}

pub struct MockConnector {
    script: Script,
    pub attempts: Mutex<Vec<tokio::time::Instant>>,
    pub sessions: Mutex<Vec<MockSession>>,
}

impl MockConnector {
    pub fn always_fail() -> Self {
        Self {
            script: Script::AlwaysFail,
            attempts: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn succeed() -> Self {
        Self {
            script: Script::Succeed,
            attempts: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn push_inbound(&self, session: usize, frame: &str) {
        self.sessions.lock().unwrap()[session]
            .inbound
            .unbounded_send(Ok(frame.to_string()))
            .expect("session closed");
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<(WsSink, WsSource), TransportError> {
        self.attempts.lock().unwrap().push(tokio::time::Instant::now());
        match self.script {
            Script::AlwaysFail => Err(TransportError::Connect("connection refused".to_string())),
            Script::Succeed => {
                let (out_tx, out_rx) = unbounded::<String>();
                let (in_tx, in_rx) = unbounded::<Result<String, TransportError>>();
                self.sessions.lock().unwrap().push(MockSession {
                    outbound: out_rx,
                    inbound: in_tx,
                });
                let sink = out_tx.sink_map_err(|e| TransportError::Io(e.to_string()));
                Ok((Box::pin(sink), Box::pin(in_rx)))
            }
        }
    }
}
