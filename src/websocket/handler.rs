//! WebSocket Handler
//!
//! Upgrades `/ws` requests and runs the per-connection loop: one task
//! drains the hub's channel into the socket, another reads client frames.
//! The connection and its subscriptions are dropped when either side ends.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::ConnectionHub;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.ws_hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, hub: ConnectionHub) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match hub.register(tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            if let Some(frame) = encode(&ServerMessage::Error {
                message: e.to_string(),
            }) {
                let _ = sender.send(frame).await;
            }
            return;
        }
    };

    let connected = encode(&ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });
    let sent = match connected {
        Some(frame) => sender.send(frame).await.is_ok(),
        None => false,
    };
    if !sent {
        tracing::error!(connection_id = %connection_id, "Failed to send connected message");
        hub.unregister(&connection_id).await;
        return;
    }

    let conn_id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Some(frame) = encode(&msg) else { continue };
            if sender.send(frame).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let hub_for_recv = hub.clone();
    let conn_id_for_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(&connection_id).await;
}

/// Returns false when the connection should close
async fn handle_ws_message(hub: &ConnectionHub, connection_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(hub, connection_id, client_msg).await,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Invalid client message"
                    );
                    let error_msg = ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    };
                    let _ = hub.send_to(connection_id, error_msg).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error_msg = ServerMessage::Error {
                message: "Binary messages not supported".to_string(),
            };
            let _ = hub.send_to(connection_id, error_msg).await;
            true
        }
        // axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

async fn handle_client_message(hub: &ConnectionHub, connection_id: &str, message: ClientMessage) {
    let reply = match message {
        ClientMessage::Subscribe { topics } => hub
            .subscribe(connection_id, topics)
            .await
            .map(|topics| ServerMessage::Subscribed { topics }),
        ClientMessage::Unsubscribe { topics } => hub
            .unsubscribe(connection_id, topics)
            .await
            .map(|topics| ServerMessage::Unsubscribed { topics }),
        ClientMessage::Ping => Ok(ServerMessage::Pong),
    };

    let reply = reply.unwrap_or_else(|e| {
        tracing::error!(connection_id = %connection_id, error = %e, "Subscription error");
        ServerMessage::Error {
            message: e.to_string(),
        }
    });
    let _ = hub.send_to(connection_id, reply).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::hub::HubConfig;

    #[tokio::test]
    async fn test_subscribe_frame_is_acknowledged() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        let frame = Message::Text(r#"{"type":"subscribe","topics":["notifications.u1"]}"#.into());
        assert!(handle_ws_message(&hub, &id, frame).await);

        match rx.try_recv().unwrap() {
            ServerMessage::Subscribed { topics } => assert_eq!(topics, vec!["notifications.u1"]),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(hub.subscription_count("notifications.u1").await, 1);
    }

    #[tokio::test]
    async fn test_wildcard_subscribe_frame_subscribes_nothing() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        let frame = Message::Text(r#"{"type":"subscribe","topics":["notifications.*"]}"#.into());
        assert!(handle_ws_message(&hub, &id, frame).await);

        match rx.try_recv().unwrap() {
            ServerMessage::Subscribed { topics } => assert!(topics.is_empty()),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(hub.subscription_count("notifications.*").await, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection_open() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        assert!(handle_ws_message(&hub, &id, Message::Text("nope".into())).await);
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Error { .. }));

        assert!(!handle_ws_message(&hub, &id, Message::Close(None)).await);
    }
}
