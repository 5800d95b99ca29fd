//! Client notifications.
//!
//! Connected observers (a dev-server socket, the CLI's stdout printer, tests)
//! subscribe to a broadcast channel of [`ClientMessage`]s.

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use super::rename::ChangeAction;

/// Custom event name for collection changes.
pub const COLLECTIONS_UPDATED: &str = "collections-updated";

/// Message pushed to connected clients.
///
/// Serializes to `{"type":"custom","event":...,"data":...}` or
/// `{"type":"full-reload"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Custom { event: String, data: Value },
    FullReload,
}

impl ClientMessage {
    /// Collections were reconciled, successfully or not.
    pub fn collections_updated(action: &ChangeAction, error: Option<&str>) -> Self {
        let mut data = json!({
            "action": action.label(),
            "path": action.path(),
            "ok": error.is_none(),
        });
        if let ChangeAction::Renamed { from, .. } = action {
            data["from"] = json!(from);
        }
        if let Some(error) = error {
            data["error"] = json!(error);
        }
        ClientMessage::Custom {
            event: COLLECTIONS_UPDATED.to_string(),
            data,
        }
    }

    pub fn is_collections_updated(&self) -> bool {
        matches!(self, ClientMessage::Custom { event, .. } if event == COLLECTIONS_UPDATED)
    }
}

/// Fans client messages out to every subscriber.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<ClientMessage>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to all current subscribers. Having none is not an error.
    pub fn send(&self, message: ClientMessage) {
        match self.sender.send(message) {
            Ok(count) => {
                crate::debug_event!("notify", "sent", "{count} subscribers");
            }
            Err(broadcast::error::SendError(message)) => {
                crate::debug_event!("notify", "dropped", "no subscribers for {message:?}");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.sender.subscribe()
    }
}
