//! In-app notifications
//!
//! Notifications are plain documents in the `notifications` collection.
//! Services emit them after a write has succeeded; a failure to emit is
//! logged and never fails the write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::crud::ServiceResult;
use crate::store::{ChangeEvent, ChangeKind, Collection, DocumentStore, Fields, Record, Stored};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PatientCreated,
    PatientUpdated,
    PatientDeleted,
    RecordCreated,
    RecordUpdated,
    RecordDeleted,
    OfficeCreated,
    OfficeUpdated,
    OfficeDeleted,
    ConsultationCreated,
    ConsultationUpdated,
    ConsultationDeleted,
    InvoiceCreated,
    InvoiceUpdated,
    InvoiceDeleted,
    InvoicePaid,
    UserCreated,
    UserUpdated,
    UserDeleted,
    InvitationCreated,
    InvitationAccepted,
    InvitationRevoked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    /// Recipient
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

impl Record for Notification {
    const COLLECTION: &'static str = "notifications";
}

/// Notification persistence and queries
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
    notifications: Collection<Notification>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            notifications: Collection::new(Arc::clone(&store)),
            store,
        }
    }

    /// Store a new unread notification for `user_id`
    pub async fn create(
        &self,
        user_id: &str,
        kind: NotificationType,
        title: &str,
        message: &str,
        related_id: Option<&str>,
    ) -> ServiceResult<Stored<Notification>> {
        let record = Notification {
            kind,
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            created_at: Utc::now(),
            user_id: user_id.to_string(),
            related_id: related_id.map(str::to_string),
        };

        let id = self.notifications.create(&record).await?;
        tracing::debug!(id = %id, user = %user_id, kind = ?kind, "Notification created");
        Ok(Stored { id, record })
    }

    /// Create a notification, logging instead of failing
    pub async fn notify(
        &self,
        user_id: &str,
        kind: NotificationType,
        title: &str,
        message: &str,
        related_id: Option<&str>,
    ) {
        if let Err(e) = self.create(user_id, kind, title, message, related_id).await {
            tracing::warn!(user = %user_id, kind = ?kind, error = %e, "Failed to create notification");
        }
    }

    pub async fn mark_read(&self, id: &str) -> ServiceResult<()> {
        let mut patch = Fields::new();
        patch.insert("read".to_string(), Value::Bool(true));
        self.notifications.update(id, patch).await?;
        Ok(())
    }

    /// Mark every unread notification of a user as read; returns how many changed
    pub async fn mark_all_read(&self, user_id: &str) -> ServiceResult<usize> {
        let unread: Vec<String> = self
            .notifications
            .all()
            .await?
            .into_iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .map(|n| n.id)
            .collect();

        for id in &unread {
            self.mark_read(id).await?;
        }
        Ok(unread.len())
    }

    pub async fn unread_count(&self, user_id: &str) -> ServiceResult<usize> {
        Ok(self
            .notifications
            .all()
            .await?
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count())
    }

    /// A user's notifications, newest first
    pub async fn list_for_user(&self, user_id: &str) -> ServiceResult<Vec<Stored<Notification>>> {
        let mut items: Vec<_> = self
            .notifications
            .all()
            .await?
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Live feed of notifications created for one user
    ///
    /// Dropping the subscription tears it down.
    pub fn subscribe(&self, user_id: &str) -> NotificationSubscription {
        NotificationSubscription {
            user_id: user_id.to_string(),
            changes: self.store.subscribe(),
        }
    }
}

/// Per-user view over the store change feed
pub struct NotificationSubscription {
    user_id: String,
    changes: broadcast::Receiver<ChangeEvent>,
}

impl NotificationSubscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Next notification created for this user; `None` once the feed closes
    pub async fn next(&mut self) -> Option<Stored<Notification>> {
        loop {
            match self.changes.recv().await {
                Ok(event) => {
                    if let Some(notification) = decode_created(event) {
                        if notification.user_id == self.user_id {
                            return Some(notification);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(user = %self.user_id, skipped, "Notification feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Notification change its recipient should hear about
#[derive(Debug, Clone)]
pub enum NotificationChange {
    Created(Stored<Notification>),
    /// Marked read, individually or through `mark_all_read`
    Read(Stored<Notification>),
}

impl NotificationChange {
    pub fn notification(&self) -> &Stored<Notification> {
        match self {
            Self::Created(n) | Self::Read(n) => n,
        }
    }
}

/// Decode a notification change out of a store change event
pub fn decode_change(event: ChangeEvent) -> Option<NotificationChange> {
    if event.collection != Notification::COLLECTION {
        return None;
    }
    let kind = event.kind;
    let stored = event
        .document?
        .decode::<Notification>(Notification::COLLECTION)
        .ok()?;

    match kind {
        ChangeKind::Created => Some(NotificationChange::Created(stored)),
        ChangeKind::Updated if stored.record.read => Some(NotificationChange::Read(stored)),
        _ => None,
    }
}

/// Decode a freshly created notification out of a change event
pub fn decode_created(event: ChangeEvent) -> Option<Stored<Notification>> {
    match decode_change(event)? {
        NotificationChange::Created(stored) => Some(stored),
        NotificationChange::Read(_) => None,
    }
}
