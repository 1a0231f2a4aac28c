//! Real-time notifications over WebSocket.
//!
//! Every connected client receives a welcome notification, then every
//! broadcast sent while it stays connected. The connection count is a plain
//! increment/decrement per socket; duplicate connections from one client are
//! counted twice.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::timestamp_now;

use super::GatewayState;

const CHANNEL_CAPACITY: usize = 64;

pub const WELCOME_MESSAGE: &str = "Connected to SUVIDHA Notification Service";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Warning,
    Alert,
    Success,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Alert => "alert",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "alert" => Ok(Self::Alert),
            "success" => Ok(Self::Success),
            _ => Err(format!("unknown notification type: {value}")),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Milliseconds since the epoch, strictly increasing within the process.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

#[derive(Debug)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
    connected: AtomicI64,
    last_id: AtomicI64,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            connected: AtomicI64::new(0),
            last_id: AtomicI64::new(0),
        }
    }

    fn next_id(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let bump = |last: i64| now.max(last + 1);
        let previous = self
            .last_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| Some(bump(last)))
            .unwrap_or_else(|last| last);
        bump(previous)
    }

    fn stamp(&self, kind: NotificationKind, message: String, priority: Option<i64>) -> Notification {
        Notification {
            id: self.next_id().to_string(),
            kind,
            message,
            timestamp: timestamp_now(),
            priority,
        }
    }

    #[must_use]
    pub fn welcome(&self) -> Notification {
        self.stamp(NotificationKind::Info, WELCOME_MESSAGE.to_string(), None)
    }

    /// Fan a notification out to every subscriber. Returns it together with
    /// the connection count at send time.
    pub fn broadcast(
        &self,
        kind: NotificationKind,
        message: String,
        priority: i64,
    ) -> (Notification, i64) {
        let notification = self.stamp(kind, message, Some(priority));
        // no receivers is not an error: nobody is connected
        let delivered = self.sender.send(notification.clone()).unwrap_or(0);
        debug!(delivered, "Broadcast queued");
        info!(message = %notification.message, "Broadcast sent");
        (notification, self.connected())
    }

    /// Register a connection. It counts as connected until the returned
    /// subscription is dropped.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let receiver = self.sender.subscribe();
        self.connected.fetch_add(1, Ordering::Relaxed);
        Subscription {
            receiver,
            hub: Arc::clone(self),
        }
    }

    #[must_use]
    pub fn connected(&self) -> i64 {
        self.connected.load(Ordering::Relaxed)
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<Notification>,
    hub: Arc<NotificationHub>,
}

impl Subscription {
    /// # Errors
    /// Returns `Lagged` when broadcasts were dropped for this subscriber and
    /// `Closed` when the hub is gone
    pub async fn recv(&mut self) -> Result<Notification, RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.connected.fetch_sub(1, Ordering::Relaxed);
    }
}

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, state: Extension<Arc<GatewayState>>) -> Response {
    let hub = Arc::clone(state.hub());
    ws.on_upgrade(move |socket| session(socket, hub))
}

async fn push(socket: &mut WebSocket, notification: &Notification) -> Result<(), axum::Error> {
    match serde_json::to_string(notification) {
        Ok(text) => socket.send(Message::Text(text)).await,
        Err(err) => {
            warn!("Failed to serialize notification: {err}");
            Ok(())
        }
    }
}

async fn session(mut socket: WebSocket, hub: Arc<NotificationHub>) {
    let mut subscription = hub.subscribe();
    info!(connected = hub.connected(), "Client connected");

    if push(&mut socket, &hub.welcome()).await.is_ok() {
        loop {
            tokio::select! {
                received = subscription.recv() => match received {
                    Ok(notification) => {
                        if push(&mut socket, &notification).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Client fell behind, notifications dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    drop(subscription);
    info!(connected = hub.connected(), "Client disconnected");
}
