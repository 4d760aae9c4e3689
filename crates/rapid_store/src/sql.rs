//! SQLite-backed document store.
//!
//! Documents are stored as JSON text rows keyed by `(collection, id)`, which
//! keeps the backend agnostic of document shape. Field-equality filtering is
//! applied in process after fetching the collection; the collections this
//! service works with are small (tokens and history per owner) and this
//! avoids a dependency on the JSON1 extension being compiled in.

use crate::error::StoreError;
use crate::store::{merge_value, Document, DocumentStore, StoreEvent};
use rapid_common::services::BoxFuture;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A document store backed by SQLite.
pub struct SqliteStore {
    pool: SqlitePool,
    channels: Mutex<HashMap<String, broadcast::Sender<StoreEvent>>>,
}

impl SqliteStore {
    /// Connect to the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if url.is_empty() {
            return Err(StoreError::ConfigError("Store URL is empty".to_string()));
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;

        debug!("Connected to document store at {}", url);
        Ok(Self {
            pool,
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Initialize the database schema.
    ///
    /// Creates the documents table if it doesn't already exist.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
        "#;
        sqlx::query(query).execute(&self.pool).await?;
        info!("Document store schema initialized");
        Ok(())
    }

    fn sender_for(&self, collection: &str) -> broadcast::Sender<StoreEvent> {
        // Recover a poisoned guard; the map stays structurally valid.
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .clone()
    }

    fn publish(&self, collection: &str, event: StoreEvent) {
        let _ = self.sender_for(collection).send(event);
    }

    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("data")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, collection: &str, id: &str, data: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(data)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn insert(&self, collection: &str, data: Value) -> BoxFuture<'_, Document, StoreError> {
        let collection = collection.to_string();
        Box::pin(async move {
            let id = Uuid::new_v4().to_string();
            self.upsert(&collection, &id, &data).await?;
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
            Ok(self
                .fetch(&collection, &id)
                .await?
                .map(|data| Document { id, data }))
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
            let existing = self.fetch(&collection, &id).await?;
            let (merged, created) = match existing {
                Some(mut current) => {
                    merge_value(&mut current, &data);
                    (current, false)
                }
                None => (data, true),
            };
            self.upsert(&collection, &id, &merged).await?;
            let doc = Document {
                id,
                data: merged,
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
            let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ?1")
                .bind(&collection)
                .fetch_all(&self.pool)
                .await?;

            let mut matches = Vec::new();
            for row in rows {
                let id: String = row.try_get("id")?;
                let raw: String = row.try_get("data")?;
                let data: Value = serde_json::from_str(&raw)?;
                if data.get(&field) == Some(&value) {
                    matches.push(Document { id, data });
                }
            }
            Ok(matches)
        })
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'_, bool, StoreError> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(&collection)
                .bind(&id)
                .execute(&self.pool)
                .await?;
            let removed = result.rows_affected() > 0;
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
            let mut tx = self.pool.begin().await?;
            let mut events = Vec::with_capacity(updates.len());

            for (id, patch) in updates {
                let row =
                    sqlx::query("SELECT data FROM documents WHERE collection = ?1 AND id = ?2")
                        .bind(&collection)
                        .bind(&id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let mut data = match row {
                    Some(row) => {
                        let raw: String = row.try_get("data")?;
                        serde_json::from_str(&raw)?
                    }
                    None => Value::Object(serde_json::Map::new()),
                };
                merge_value(&mut data, &patch);
                let raw = serde_json::to_string(&data)?;
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, data)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data
                    "#,
                )
                .bind(&collection)
                .bind(&id)
                .bind(raw)
                .execute(&mut *tx)
                .await?;
                events.push(StoreEvent::Modified {
                    collection: collection.clone(),
                    doc: Document { id, data },
                });
            }

            tx.commit().await?;

            // Events go out only after the batch is durable.
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_and_query_round_trip() {
        let store = test_store().await;
        let doc = store
            .insert("pushTokens", json!({"token": "t-1", "email": "a@b.c"}))
            .await
            .unwrap();

        let by_token = store
            .query_eq("pushTokens", "token", &json!("t-1"))
            .await
            .unwrap();
        assert_eq!(by_token.len(), 1);
        assert_eq!(by_token[0].id, doc.id);
    }

    #[tokio::test]
    async fn set_merge_updates_in_place() {
        let store = test_store().await;
        store
            .set_merge("notificationPreferences", "owner", json!({"a": 1}))
            .await
            .unwrap();
        let merged = store
            .set_merge("notificationPreferences", "owner", json!({"b": 2}))
            .await
            .unwrap();
        assert_eq!(merged.data, json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn batch_merge_is_atomic_per_call() {
        let store = test_store().await;
        let a = store
            .insert("notificationHistory", json!({"read": false}))
            .await
            .unwrap();
        let b = store
            .insert("notificationHistory", json!({"read": false}))
            .await
            .unwrap();
        store
            .batch_merge(
                "notificationHistory",
                vec![
                    (a.id.clone(), json!({"read": true})),
                    (b.id.clone(), json!({"read": true})),
                ],
            )
            .await
            .unwrap();
        for id in [&a.id, &b.id] {
            let doc = store.get("notificationHistory", id).await.unwrap().unwrap();
            assert_eq!(doc.data["read"], json!(true));
        }
    }
}
