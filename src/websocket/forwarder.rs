//! Store change feed → hub bridge
//!
//! Every notification document created in the store is pushed to the
//! `notifications.{userId}` topic of the hub, followed later by a
//! `notification_read` frame once it is marked read.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::hub::ConnectionHub;
use super::messages::WsEvent;
use crate::clinic::notifications::{decode_change, NotificationChange};
use crate::store::DocumentStore;

/// Spawn the forwarding task; it ends when the store's change feed closes
pub fn spawn_notification_forwarder(
    store: Arc<dyn DocumentStore>,
    hub: ConnectionHub,
) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(event) => {
                    let ws_event = match decode_change(event) {
                        Some(NotificationChange::Created(n)) => WsEvent::notification(n),
                        Some(NotificationChange::Read(n)) => WsEvent::notification_read(&n),
                        None => continue,
                    };
                    hub.broadcast(&ws_event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("Notification forwarder stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinic::{NotificationService, NotificationType};
    use crate::store::MemoryStore;
    use crate::websocket::hub::HubConfig;
    use crate::websocket::messages::ServerMessage;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn next_message(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_created_notification_reaches_subscriber() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let hub = ConnectionHub::new(HubConfig::default());
        let forwarder = spawn_notification_forwarder(Arc::clone(&store), hub.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = hub.register(tx).await.unwrap();
        hub.subscribe(&conn, vec!["notifications.u1".to_string()])
            .await
            .unwrap();

        let notifications = NotificationService::new(Arc::clone(&store));
        notifications
            .create("u2", NotificationType::RecordCreated, "Otro", "no es para u1", None)
            .await
            .unwrap();
        notifications
            .create("u1", NotificationType::PatientCreated, "Nuevo paciente", "Ana", Some("p1"))
            .await
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match msg {
            ServerMessage::Notification { notification, .. } => {
                assert_eq!(notification.user_id, "u1");
                assert_eq!(notification.title, "Nuevo paciente");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(rx.try_recv().is_err());

        forwarder.abort();
    }

    #[tokio::test]
    async fn test_mark_read_reaches_subscriber() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let hub = ConnectionHub::new(HubConfig::default());
        let notifications = NotificationService::new(Arc::clone(&store));
        let first = notifications
            .create("u1", NotificationType::InvoicePaid, "Factura pagada", "FAC-1", None)
            .await
            .unwrap();
        let second = notifications
            .create("u1", NotificationType::InvoicePaid, "Factura pagada", "FAC-2", None)
            .await
            .unwrap();

        let forwarder = spawn_notification_forwarder(Arc::clone(&store), hub.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = hub.register(tx).await.unwrap();
        hub.subscribe(&conn, vec!["notifications.u1".to_string()])
            .await
            .unwrap();

        notifications.mark_read(&first.id).await.unwrap();
        match next_message(&mut rx).await {
            ServerMessage::NotificationRead { id } => assert_eq!(id, first.id),
            other => panic!("unexpected message: {:?}", other),
        }

        assert_eq!(notifications.mark_all_read("u1").await.unwrap(), 1);
        match next_message(&mut rx).await {
            ServerMessage::NotificationRead { id } => assert_eq!(id, second.id),
            other => panic!("unexpected message: {:?}", other),
        }

        forwarder.abort();
    }
}
