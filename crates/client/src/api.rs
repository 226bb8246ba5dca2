//! HTTP API client for the marketplace REST endpoints.
//!
//! The [`Api`] trait names every REST operation the stores depend on;
//! [`ApiClient`] is the reqwest implementation. Stores hold an
//! `Arc<dyn Api>` so tests can substitute a scripted implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use ridelink_shared::{
    ApiError, ChatRoom, ClearAllResponse, Message, Notification, PaymentRecord,
    SendMessageRequest, MESSAGES_PAGE_SIZE,
};

use crate::config::ClientConfig;

/// REST operations consumed by the stores.
#[async_trait]
pub trait Api: Send + Sync {
    /// `GET /notifications`
    async fn notifications(&self) -> Result<Vec<Notification>, ApiError>;
    /// `PUT /notifications/{id}/read`
    async fn mark_notification_read(&self, id: &str) -> Result<(), ApiError>;
    /// `PUT /notifications/mark-all-read`
    async fn mark_all_notifications_read(&self) -> Result<(), ApiError>;
    /// `DELETE /notifications/{id}`
    async fn delete_notification(&self, id: &str) -> Result<(), ApiError>;
    /// `DELETE /notifications/clear-all`
    async fn clear_notifications(&self) -> Result<ClearAllResponse, ApiError>;
    /// `GET /messages/conversation/{userId}` (1-based `page`)
    async fn conversation(&self, user_id: &str, page: u32) -> Result<Vec<Message>, ApiError>;
    /// `POST /messages`
    async fn send_message(&self, req: &SendMessageRequest) -> Result<Message, ApiError>;
    /// `PUT /messages/{id}/read`
    async fn mark_message_read(&self, id: &str) -> Result<(), ApiError>;
    /// `GET /messages/conversations`
    async fn conversations(&self) -> Result<Vec<ChatRoom>, ApiError>;
    /// `GET /payments/{id}`
    async fn payment(&self, id: &str) -> Result<PaymentRecord, ApiError>;
}

/// HTTP client for making bearer-authenticated API requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_base.clone(),
            bearer_token: config.bearer_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn read_response<TRes: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<TRes, ApiError> {
        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        // Some mutating endpoints answer with an empty body.
        if text.is_empty() {
            serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let rb = self.authed(self.client.get(self.url(path)));
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_response(resp).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize + Sync, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = self.authed(self.client.post(self.url(path))).json(body);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_response(resp).await
    }

    /// Make a PUT request with JSON body
    pub async fn put_json<TReq: Serialize + Sync, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = self.authed(self.client.put(self.url(path))).json(body);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_response(resp).await
    }

    /// Make a DELETE request, decoding the response body
    pub async fn delete_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let rb = self.authed(self.client.delete(self.url(path)));
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_response(resp).await
    }
}

#[async_trait]
impl Api for ApiClient {
    async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get_json("/notifications").await
    }

    async fn mark_notification_read(&self, id: &str) -> Result<(), ApiError> {
        self.put_json::<_, serde_json::Value>(&format!("/notifications/{id}/read"), &serde_json::json!({}))
            .await
            .map(|_| ())
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        self.put_json::<_, serde_json::Value>("/notifications/mark-all-read", &serde_json::json!({}))
            .await
            .map(|_| ())
    }

    async fn delete_notification(&self, id: &str) -> Result<(), ApiError> {
        self.delete_json::<serde_json::Value>(&format!("/notifications/{id}"))
            .await
            .map(|_| ())
    }

    async fn clear_notifications(&self) -> Result<ClearAllResponse, ApiError> {
        self.delete_json("/notifications/clear-all").await
    }

    async fn conversation(&self, user_id: &str, page: u32) -> Result<Vec<Message>, ApiError> {
        self.get_json(&format!(
            "/messages/conversation/{user_id}?page={page}&limit={MESSAGES_PAGE_SIZE}"
        ))
        .await
    }

    async fn send_message(&self, req: &SendMessageRequest) -> Result<Message, ApiError> {
        self.post_json("/messages", req).await
    }

    async fn mark_message_read(&self, id: &str) -> Result<(), ApiError> {
        self.put_json::<_, serde_json::Value>(&format!("/messages/{id}/read"), &serde_json::json!({}))
            .await
            .map(|_| ())
    }

    async fn conversations(&self) -> Result<Vec<ChatRoom>, ApiError> {
        self.get_json("/messages/conversations").await
    }

    async fn payment(&self, id: &str) -> Result<PaymentRecord, ApiError> {
        self.get_json(&format!("/payments/{id}")).await
    }
}
