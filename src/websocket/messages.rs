//! WebSocket Message Types
//!
//! Client and server frames exchanged over `/ws`. Both are JSON objects
//! tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::clinic::Notification;
use crate::store::Stored;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to topics (e.g. `notifications.{uid}`)
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
    /// Keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A notification was created for the subscribed user
    Notification {
        id: String,
        notification: Notification,
    },
    /// A notification of the subscribed user was marked read
    NotificationRead { id: String },
    Subscribed { topics: Vec<String> },
    Unsubscribed { topics: Vec<String> },
    Pong,
    Error { message: String },
    /// Sent once right after the upgrade
    Connected { connection_id: String },
}

/// Internal event routed through the hub
#[derive(Debug, Clone)]
pub struct WsEvent {
    /// Topic this event belongs to (e.g. `notifications.u1`)
    pub topic: String,
    pub message: ServerMessage,
}

impl WsEvent {
    /// Event for a freshly created notification, routed to its recipient
    pub fn notification(stored: Stored<Notification>) -> Self {
        let Stored { id, record } = stored;
        Self {
            topic: notification_topic(&record.user_id),
            message: ServerMessage::Notification {
                id,
                notification: record,
            },
        }
    }

    /// Event for a notification its recipient has just read
    pub fn notification_read(stored: &Stored<Notification>) -> Self {
        Self {
            topic: notification_topic(&stored.record.user_id),
            message: ServerMessage::NotificationRead {
                id: stored.id.clone(),
            },
        }
    }
}

/// Topic carrying one user's notifications
pub fn notification_topic(user_id: &str) -> String {
    format!("notifications.{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic::NotificationType;
    use chrono::Utc;

    fn stored(user_id: &str) -> Stored<Notification> {
        Stored {
            id: "n1".to_string(),
            record: Notification {
                kind: NotificationType::InvoicePaid,
                title: "Factura pagada".to_string(),
                message: "La factura FAC-1 ha sido pagada".to_string(),
                read: false,
                created_at: Utc::now(),
                user_id: user_id.to_string(),
                related_id: Some("inv1".to_string()),
            },
        }
    }

    #[test]
    fn test_client_message_deserialize_subscribe() {
        let json = r#"{"type": "subscribe", "topics": ["notifications.u1"]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Subscribe { topics } => assert_eq!(topics, vec!["notifications.u1"]),
            _ => panic!("Expected Subscribe"),
        }
    }

    #[test]
    fn test_client_message_deserialize_ping() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_notification_event_topic_and_payload() {
        let event = WsEvent::notification(stored("u7"));
        assert_eq!(event.topic, "notifications.u7");

        let json = serde_json::to_value(&event.message).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["id"], "n1");
        assert_eq!(json["notification"]["type"], "invoice_paid");
        assert_eq!(json["notification"]["userId"], "u7");
    }

    #[test]
    fn test_notification_read_event() {
        let event = WsEvent::notification_read(&stored("u3"));
        assert_eq!(event.topic, "notifications.u3");

        let json = serde_json::to_value(&event.message).unwrap();
        assert_eq!(json, serde_json::json!({"type": "notification_read", "id": "n1"}));
    }

    #[test]
    fn test_server_message_serialize_connected() {
        let msg = ServerMessage::Connected {
            connection_id: "abc-123".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"connection_id\":\"abc-123\""));
    }
}
