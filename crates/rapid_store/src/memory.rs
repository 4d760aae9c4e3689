// --- File: crates/rapid_store/src/memory.rs ---
//! In-memory document store.
//!
//! Backs tests and local development. Semantics match the SQL backend:
//! upsert-with-merge, field-equality queries, and broadcast change events.

use crate::error::StoreError;
use crate::store::{merge_value, Document, DocumentStore, StoreEvent};
use rapid_common::services::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// An in-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
    channels: Mutex<HashMap<String, broadcast::Sender<StoreEvent>>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    // Lock poisoning only means another thread panicked mid-operation; the
    // map itself stays structurally valid, so recover the guard.
    fn collections_read(&self) -> RwLockReadGuard<'_, HashMap<String, HashMap<String, Value>>> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn collections_write(&self) -> RwLockWriteGuard<'_, HashMap<String, HashMap<String, Value>>> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn sender_for(&self, collection: &str) -> broadcast::Sender<StoreEvent> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .clone()
    }

    fn publish(&self, collection: &str, event: StoreEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.sender_for(collection).send(event);
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, data: Value) -> BoxFuture<'_, Document, StoreError> {
        let collection = collection.to_string();
        Box::pin(async move {
            let id = Uuid::new_v4().to_string();
            {
                let mut collections = self.collections_write();
                collections
                    .entry(collection.clone())
                    .or_default()
                    .insert(id.clone(), data.clone());
            }
            let doc = Document { id, data };
            self.publish(
                &collection,
                StoreEvent::Added {
                    collection: collection.clone(),
                    doc: doc.clone(),
                },
            );
            Ok(doc)
        })
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<'_, Option<Document>, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let collections = self.collections_read();
            Ok(collections
                .get(&collection)
                .and_then(|docs| docs.get(&id))
                .map(|data| Document {
                    id: id.clone(),
                    data: data.clone(),
                }))
        })
    }

    fn set_merge(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> BoxFuture<'_, Document, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let (doc, created) = {
                let mut collections = self.collections_write();
                let docs = collections.entry(collection.clone()).or_default();
                match docs.get_mut(&id) {
                    Some(existing) => {
                        merge_value(existing, &data);
                        (
                            Document {
                                id: id.clone(),
                                data: existing.clone(),
                            },
                            false,
                        )
                    }
                    None => {
                        docs.insert(id.clone(), data.clone());
                        (
                            Document {
                                id: id.clone(),
                                data,
                            },
                            true,
                        )
                    }
                }
            };
            let event = if created {
                StoreEvent::Added {
                    collection: collection.clone(),
                    doc: doc.clone(),
                }
            } else {
                StoreEvent::Modified {
                    collection: collection.clone(),
                    doc: doc.clone(),
                }
            };
            self.publish(&collection, event);
            Ok(doc)
        })
    }

    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> BoxFuture<'_, Vec<Document>, StoreError> {
        let collection = collection.to_string();
        let field = field.to_string();
        let value = value.clone();
        Box::pin(async move {
            let collections = self.collections_read();
            Ok(collections
                .get(&collection)
                .map(|docs| {
                    docs.iter()
                        .filter(|(_, data)| data.get(&field) == Some(&value))
                        .map(|(id, data)| Document {
                            id: id.clone(),
                            data: data.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'_, bool, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let removed = {
                let mut collections = self.collections_write();
                collections
                    .get_mut(&collection)
                    .map(|docs| docs.remove(&id).is_some())
                    .unwrap_or(false)
            };
            if removed {
                self.publish(
                    &collection,
                    StoreEvent::Removed {
                        collection: collection.clone(),
                        id,
                    },
                );
            }
            Ok(removed)
        })
    }

    fn batch_merge(
        &self,
        collection: &str,
        updates: Vec<(String, Value)>,
    ) -> BoxFuture<'_, (), StoreError> {
        let collection = collection.to_string();
        Box::pin(async move {
            let mut events = Vec::with_capacity(updates.len());
            {
                // One lock acquisition for the whole batch, mirroring the
                // single round trip a batched write gives remote stores.
                let mut collections = self.collections_write();
                let docs = collections.entry(collection.clone()).or_default();
                for (id, patch) in updates {
                    let entry = docs.entry(id.clone()).or_insert_with(|| Value::Object(
                        serde_json::Map::new(),
                    ));
                    merge_value(entry, &patch);
                    events.push(StoreEvent::Modified {
                        collection: collection.clone(),
                        doc: Document {
                            id,
                            data: entry.clone(),
                        },
                    });
                }
            }
            for event in events {
                self.publish(&collection, event);
            }
            Ok(())
        })
    }

    fn subscribe(&self, collection: &str) -> broadcast::Receiver<StoreEvent> {
        self.sender_for(collection).subscribe()
    }
}
