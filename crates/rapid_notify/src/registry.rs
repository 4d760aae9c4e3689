// --- File: crates/rapid_notify/src/registry.rs ---
//! Token and preference registry.
//!
//! Wraps the `pushTokens` and `notificationPreferences` collections behind
//! the invariants the rest of the core relies on: one document per token
//! value, `createdAt` immutable across re-registrations, and preference
//! merges that never clobber sibling notification types.

use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use rapid_store::DocumentStore;

use crate::error::NotifyError;
use crate::models::{
    ChannelToggles, DeviceMetadata, NotificationPreferences, NotificationType, PushToken,
    PREFERENCES_COLLECTION, TOKENS_COLLECTION,
};

/// Registry over the token and preferences collections.
#[derive(Clone)]
pub struct TokenRegistry {
    store: Arc<dyn DocumentStore>,
}

impl TokenRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Register a token, or refresh it if the value is already known.
    ///
    /// Re-registration updates `lastUsed` and device metadata but never
    /// `createdAt`, and leaves the stored `email` alone unless the caller
    /// explicitly supplies one. Other documents for the same owner are
    /// untouched; every device keeps its own token document.
    ///
    /// When an owner is supplied, their preferences document is seeded or
    /// back-filled so delivery gating always has something to read.
    ///
    /// # Returns
    ///
    /// The id of the token document written.
    pub async fn upsert_token(
        &self,
        token: &str,
        owner_email: Option<&str>,
        metadata: &DeviceMetadata,
    ) -> Result<String, NotifyError> {
        let now = Utc::now();
        let existing = self
            .store
            .query_eq(TOKENS_COLLECTION, "token", &json!(token))
            .await?;

        let doc_id = match existing.first() {
            Some(doc) => {
                let mut patch = json!({
                    "lastUsed": now,
                    "userAgent": metadata.user_agent,
                    "isMobile": metadata.is_mobile,
                    "isIOS": metadata.is_ios,
                });
                if let Some(email) = owner_email {
                    patch["email"] = json!(email);
                }
                self.store
                    .set_merge(TOKENS_COLLECTION, &doc.id, patch)
                    .await?;
                debug!(doc_id = %doc.id, "refreshed existing push token");
                doc.id.clone()
            }
            None => {
                let record = PushToken {
                    token: token.to_string(),
                    email: owner_email.map(str::to_string),
                    created_at: now,
                    last_used: now,
                    user_agent: metadata.user_agent.clone(),
                    is_mobile: metadata.is_mobile,
                    is_ios: metadata.is_ios,
                };
                let doc = self
                    .store
                    .insert(TOKENS_COLLECTION, serde_json::to_value(&record).map_err(
                        rapid_store::StoreError::from,
                    )?)
                    .await?;
                debug!(doc_id = %doc.id, "registered new push token");
                doc.id
            }
        };

        if let Some(owner) = owner_email {
            self.ensure_preferences(owner).await?;
        }

        Ok(doc_id)
    }

    /// All token documents registered for an owner. Documents that fail to
    /// parse are skipped with a warning rather than failing the lookup.
    pub async fn tokens_for_owner(&self, owner_email: &str) -> Result<Vec<PushToken>, NotifyError> {
        let docs = self
            .store
            .query_eq(TOKENS_COLLECTION, "email", &json!(owner_email))
            .await?;

        let mut tokens = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<PushToken>(doc.data) {
                Ok(token) => tokens.push(token),
                Err(err) => {
                    warn!(doc_id = %doc.id, error = %err, "skipping unparseable token document");
                }
            }
        }
        Ok(tokens)
    }

    /// Just the token values for an owner, the shape the push channel needs.
    pub async fn token_values_for_owner(
        &self,
        owner_email: &str,
    ) -> Result<Vec<String>, NotifyError> {
        Ok(self
            .tokens_for_owner(owner_email)
            .await?
            .into_iter()
            .map(|t| t.token)
            .collect())
    }

    /// Delete a token document by its token value. Used when the push
    /// service reports the token as stale.
    pub async fn remove_token(&self, token: &str) -> Result<bool, NotifyError> {
        let docs = self
            .store
            .query_eq(TOKENS_COLLECTION, "token", &json!(token))
            .await?;
        let mut removed = false;
        for doc in docs {
            removed |= self.store.delete(TOKENS_COLLECTION, &doc.id).await?;
        }
        Ok(removed)
    }

    /// Make sure an owner has a preferences document.
    ///
    /// Absent documents are created with every recognized type fully
    /// enabled. Existing documents are back-filled with any recognized type
    /// they are missing, merging so the types already present keep their
    /// stored toggles exactly.
    pub async fn ensure_preferences(&self, owner_email: &str) -> Result<(), NotifyError> {
        let now = Utc::now();
        let existing = self.store.get(PREFERENCES_COLLECTION, owner_email).await?;

        match existing {
            None => {
                let defaults = NotificationPreferences {
                    created_at: Some(now),
                    updated_at: Some(now),
                    ..NotificationPreferences::fully_enabled()
                };
                self.store
                    .set_merge(
                        PREFERENCES_COLLECTION,
                        owner_email,
                        serde_json::to_value(&defaults)
                            .map_err(rapid_store::StoreError::from)?,
                    )
                    .await?;
                debug!(owner = %owner_email, "seeded default notification preferences");
            }
            Some(doc) => {
                let stored_keys = doc
                    .data
                    .get("preferences")
                    .and_then(Value::as_object)
                    .map(|map| map.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();

                let mut missing = serde_json::Map::new();
                for kind in NotificationType::all() {
                    if !stored_keys.iter().any(|k| k == kind.as_key()) {
                        missing.insert(
                            kind.as_key().to_string(),
                            json!(ChannelToggles::default()),
                        );
                    }
                }
                if !missing.is_empty() {
                    self.store
                        .set_merge(
                            PREFERENCES_COLLECTION,
                            owner_email,
                            json!({
                                "preferences": Value::Object(missing),
                                "updatedAt": now,
                            }),
                        )
                        .await?;
                    debug!(owner = %owner_email, "back-filled missing preference types");
                }
            }
        }

        Ok(())
    }

    /// An owner's preferences, or the fully-enabled defaults when the
    /// document is absent or unparseable. Read failures degrade rather than
    /// propagate so delivery gating never blocks a send.
    pub async fn preferences_for(&self, owner_email: &str) -> NotificationPreferences {
        match self.store.get(PREFERENCES_COLLECTION, owner_email).await {
            Ok(Some(doc)) => match serde_json::from_value(doc.data) {
                Ok(preferences) => preferences,
                Err(err) => {
                    warn!(owner = %owner_email, error = %err,
                        "unparseable preferences document, using defaults");
                    NotificationPreferences::fully_enabled()
                }
            },
            Ok(None) => NotificationPreferences::fully_enabled(),
            Err(err) => {
                warn!(owner = %owner_email, error = %err,
                    "preferences read failed, using defaults");
                NotificationPreferences::fully_enabled()
            }
        }
    }

    /// Overwrite the toggles for the supplied types, merging so any type
    /// not mentioned keeps its stored value.
    pub async fn update_preferences(
        &self,
        owner_email: &str,
        toggles: BTreeMap<String, ChannelToggles>,
    ) -> Result<NotificationPreferences, NotifyError> {
        let now = Utc::now();
        let mut patch_map = serde_json::Map::new();
        for (key, value) in &toggles {
            patch_map.insert(key.clone(), json!(value));
        }
        let doc = self
            .store
            .set_merge(
                PREFERENCES_COLLECTION,
                owner_email,
                json!({
                    "preferences": Value::Object(patch_map),
                    "updatedAt": now,
                }),
            )
            .await?;

        serde_json::from_value(doc.data)
            .map_err(|err| NotifyError::Store(rapid_store::StoreError::from(err)))
    }
}
