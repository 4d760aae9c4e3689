// --- File: crates/rapid_store/src/store.rs ---
//! Document store trait.
//!
//! The notification core depends only on this interface, never on a concrete
//! store SDK. Documents are schemaless JSON objects grouped into named
//! collections; the natural-key lookups the core needs (token value, owner
//! id) are expressed as field-equality queries.

use crate::error::StoreError;
use rapid_common::services::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast;

/// A stored document: its collection-unique id plus the JSON object payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The id of the document within its collection.
    pub id: String,
    /// The document payload. Always a JSON object.
    pub data: Value,
}

/// A change notification emitted to collection subscribers.
///
/// Subscribers receive these over a broadcast channel after the write has
/// been applied, which is what drives the real-time history surface.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A new document was created.
    Added { collection: String, doc: Document },
    /// An existing document was updated.
    Modified { collection: String, doc: Document },
    /// A document was deleted.
    Removed { collection: String, id: String },
}

/// A trait for document store backends.
///
/// All operations are asynchronous and non-blocking. Writes are
/// last-writer-wins on individual fields; `set_merge` and `batch_merge`
/// merge JSON objects recursively so unrelated keys survive concurrent
/// updates.
pub trait DocumentStore: Send + Sync {
    /// Create a new document with a generated id.
    ///
    /// # Returns
    ///
    /// The stored document, including its generated id.
    fn insert(&self, collection: &str, data: Value) -> BoxFuture<'_, Document, StoreError>;

    /// Read a document by id.
    ///
    /// # Returns
    ///
    /// The document if found, or None if not found.
    fn get(&self, collection: &str, id: &str) -> BoxFuture<'_, Option<Document>, StoreError>;

    /// Create or update a document at a known id, merging `data` into any
    /// existing payload (upsert-with-merge semantics).
    ///
    /// # Returns
    ///
    /// The document as stored after the merge.
    fn set_merge(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> BoxFuture<'_, Document, StoreError>;

    /// Find all documents whose top-level `field` equals `value`.
    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> BoxFuture<'_, Vec<Document>, StoreError>;

    /// Delete a document by id.
    ///
    /// # Returns
    ///
    /// `true` if a document was deleted, `false` if it was not found.
    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'_, bool, StoreError>;

    /// Apply a set of merges as one batched write, bounding round trips for
    /// "mark all" style operations.
    fn batch_merge(
        &self,
        collection: &str,
        updates: Vec<(String, Value)>,
    ) -> BoxFuture<'_, (), StoreError>;

    /// Subscribe to change notifications for a collection.
    fn subscribe(&self, collection: &str) -> broadcast::Receiver<StoreEvent>;
}

/// Recursively merge `patch` into `target`.
///
/// Object values merge key-by-key; any other value type replaces the
/// existing one. This mirrors merge-style upserts in document databases so
/// a preferences update touching one notification type leaves the others
/// byte-for-byte unchanged.
pub fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_value(existing, patch_value),
                    None => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target, patch) => {
            *target = patch.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_preserves_unrelated_keys() {
        let mut target = json!({
            "preferences": {
                "blogNotifications": {"mobile": false, "email": true}
            },
            "createdAt": "2026-01-01T00:00:00Z"
        });
        let original_blog = target["preferences"]["blogNotifications"].clone();

        merge_value(
            &mut target,
            &json!({
                "preferences": {
                    "taskMessages": {"mobile": true, "email": true}
                }
            }),
        );

        assert_eq!(target["preferences"]["blogNotifications"], original_blog);
        assert_eq!(target["preferences"]["taskMessages"]["mobile"], json!(true));
        assert_eq!(target["createdAt"], json!("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn merge_replaces_scalars() {
        let mut target = json!({"read": false, "readAt": "2026-01-01T00:00:00Z"});
        merge_value(&mut target, &json!({"read": true, "readAt": null}));
        assert_eq!(target["read"], json!(true));
        assert_eq!(target["readAt"], Value::Null);
    }
}
