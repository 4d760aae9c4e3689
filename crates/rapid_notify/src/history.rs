//! Persisted notification history.
//!
//! Every dispatched notification is recorded so the in-app notification
//! center can list it, show an unread badge, and flip read state. Reads
//! degrade to empty results on store failure so the notification center
//! never takes a page down; writes propagate their errors to the caller,
//! which decides whether the failure is fatal.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use rapid_store::{DocumentStore, StoreEvent};

use crate::error::NotifyError;
use crate::models::{HistoryEntry, NotificationType, HISTORY_COLLECTION};

/// Wraps the `notificationHistory` collection.
#[derive(Clone)]
pub struct NotificationHistory {
    store: Arc<dyn DocumentStore>,
}

impl NotificationHistory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record a freshly dispatched notification. Entries start unread with
    /// no read timestamp.
    ///
    /// # Returns
    ///
    /// The id of the new history document.
    pub async fn record(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        url: Option<&str>,
        kind: NotificationType,
    ) -> Result<String, NotifyError> {
        let entry = HistoryEntry {
            id: String::new(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            url: url.map(str::to_string),
            kind,
            read: false,
            created_at: Utc::now(),
            read_at: None,
        };
        let doc = self
            .store
            .insert(
                HISTORY_COLLECTION,
                serde_json::to_value(&entry).map_err(rapid_store::StoreError::from)?,
            )
            .await?;
        Ok(doc.id)
    }

    /// All history entries for an owner, newest first.
    ///
    /// Store failures degrade to an empty list with a warning.
    pub async fn list_for_owner(&self, user_id: &str) -> Vec<HistoryEntry> {
        let docs = match self
            .store
            .query_eq(HISTORY_COLLECTION, "userId", &json!(user_id))
            .await
        {
            Ok(docs) => docs,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "history read failed, returning empty");
                return Vec::new();
            }
        };

        let mut entries: Vec<HistoryEntry> = docs
            .into_iter()
            .filter_map(|doc| {
                match serde_json::from_value::<HistoryEntry>(doc.data) {
                    Ok(mut entry) => {
                        entry.id = doc.id;
                        Some(entry)
                    }
                    Err(err) => {
                        warn!(doc_id = %doc.id, error = %err, "skipping unparseable history entry");
                        None
                    }
                }
            })
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// Number of unread entries for an owner. Degrades to zero on failure.
    pub async fn unread_count(&self, user_id: &str) -> usize {
        self.list_for_owner(user_id)
            .await
            .iter()
            .filter(|entry| !entry.read)
            .count()
    }

    /// Mark an entry read, stamping `readAt`.
    pub async fn mark_read(&self, entry_id: &str) -> Result<(), NotifyError> {
        self.store
            .set_merge(
                HISTORY_COLLECTION,
                entry_id,
                json!({"read": true, "readAt": Utc::now()}),
            )
            .await?;
        Ok(())
    }

    /// Revert an entry to unread, clearing `readAt` so a later re-read
    /// restores the exact unread shape.
    pub async fn mark_unread(&self, entry_id: &str) -> Result<(), NotifyError> {
        self.store
            .set_merge(
                HISTORY_COLLECTION,
                entry_id,
                json!({"read": false, "readAt": Value::Null}),
            )
            .await?;
        Ok(())
    }

    /// Mark every unread entry for an owner read, as one batched write.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize, NotifyError> {
        let patch = json!({"read": true, "readAt": Utc::now()});
        self.batch_flip(user_id, |entry| !entry.read, patch).await
    }

    /// Revert every read entry for an owner to unread, as one batched write.
    pub async fn mark_all_unread(&self, user_id: &str) -> Result<usize, NotifyError> {
        let patch = json!({"read": false, "readAt": Value::Null});
        self.batch_flip(user_id, |entry| entry.read, patch).await
    }

    async fn batch_flip(
        &self,
        user_id: &str,
        selector: impl Fn(&HistoryEntry) -> bool,
        patch: Value,
    ) -> Result<usize, NotifyError> {
        let updates: Vec<(String, Value)> = self
            .list_for_owner(user_id)
            .await
            .into_iter()
            .filter(|entry| selector(entry))
            .map(|entry| (entry.id, patch.clone()))
            .collect();

        let count = updates.len();
        if count > 0 {
            self.store.batch_merge(HISTORY_COLLECTION, updates).await?;
        }
        Ok(count)
    }

    /// Delete a single history entry.
    pub async fn delete(&self, entry_id: &str) -> Result<bool, NotifyError> {
        Ok(self.store.delete(HISTORY_COLLECTION, entry_id).await?)
    }

    /// Subscribe to live history changes, for the real-time badge.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe(HISTORY_COLLECTION)
    }
}
