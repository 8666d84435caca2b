use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{AlertError, Result};
use crate::models::{ConditionKind, Notification};

pub const COLLECTION: &str = "notifications";

/// The only mutations the engine ever writes back. Each one is applied as a
/// targeted update guarded by the state the engine evaluated against, so edits
/// made between ticks to other fields survive.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// A Range/Percent notification reached a boundary and is now terminal.
    Triggered { triggered_at: i64 },
    /// An EmaCross notification flipped direction.
    Flipped {
        was_above: bool,
        is_above: bool,
        current_ema: Decimal,
        triggered_at: i64,
    },
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn load_active(&self) -> Result<Vec<Notification>>;

    /// Fails with `PersistenceConflict` when the stored document no longer
    /// matches the expected prior state.
    async fn save(&self, id: &ObjectId, change: &StateChange) -> Result<()>;

    async fn insert(&self, notification: &Notification) -> Result<()>;

    async fn get(&self, id: &ObjectId) -> Result<Option<Notification>>;

    /// Newest first.
    async fn list_for_chat(&self, chat_id: &str, active_only: bool) -> Result<Vec<Notification>>;

    /// Range/Percent only. Returns false when nothing active matched.
    async fn deactivate(&self, id: &ObjectId, chat_id: &str) -> Result<bool>;

    async fn delete(&self, id: &ObjectId, chat_id: &str) -> Result<bool>;

    async fn delete_all_for_chat(&self, chat_id: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

// ---------------- MongoDB ----------------

#[derive(Clone)]
pub struct MongoNotificationStore {
    db: Database,
}

impl MongoNotificationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn typed(&self) -> Collection<Notification> {
        self.db.collection::<Notification>(COLLECTION)
    }

    fn raw(&self) -> Collection<Document> {
        self.db.collection::<Document>(COLLECTION)
    }

    // Decodes one document at a time so a single bad record cannot hide the rest.
    async fn find_decoded(&self, filter: Document, opts: Option<FindOptions>) -> Result<Vec<Notification>> {
        let mut cursor = self.raw().find(filter, opts).await?;

        let mut items = Vec::new();
        while let Some(item) = cursor.next().await {
            let raw = item?;
            let id = raw.get_object_id("_id").map(|o| o.to_hex()).unwrap_or_default();

            match mongodb::bson::from_document::<Notification>(raw) {
                Ok(n) => items.push(n),
                Err(e) => {
                    tracing::error!(notification_id = %id, error = %e, "undecodable notification skipped");
                }
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl NotificationStore for MongoNotificationStore {
    async fn load_active(&self) -> Result<Vec<Notification>> {
        self.find_decoded(doc! { "is_active": true }, None).await
    }

    async fn save(&self, id: &ObjectId, change: &StateChange) -> Result<()> {
        let (filter, update) = match change {
            StateChange::Triggered { triggered_at } => (
                doc! { "_id": *id, "is_active": true, "triggered_at": Bson::Null },
                doc! { "$set": { "is_active": false, "triggered_at": *triggered_at } },
            ),
            StateChange::Flipped {
                was_above,
                is_above,
                current_ema,
                triggered_at,
            } => (
                doc! {
                    "_id": *id,
                    "kind": ConditionKind::EmaCross.as_str(),
                    "ema_cross.is_above": *was_above,
                },
                doc! {
                    "$set": {
                        "ema_cross.is_above": *is_above,
                        "ema_cross.current_ema": current_ema.to_string(),
                        "ema_cross.updated_at": *triggered_at,
                        "triggered_at": *triggered_at,
                    }
                },
            ),
        };

        let res = self.raw().update_one(filter, update, None).await?;
        if res.matched_count == 0 {
            return Err(AlertError::PersistenceConflict { id: id.to_hex() });
        }

        Ok(())
    }

    async fn insert(&self, notification: &Notification) -> Result<()> {
        self.typed().insert_one(notification, None).await?;
        Ok(())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Notification>> {
        Ok(self.typed().find_one(doc! { "_id": *id }, None).await?)
    }

    async fn list_for_chat(&self, chat_id: &str, active_only: bool) -> Result<Vec<Notification>> {
        let mut filter = doc! { "chat_id": chat_id };
        if active_only {
            filter.insert("is_active", true);
        }

        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        self.find_decoded(filter, Some(opts)).await
    }

    async fn deactivate(&self, id: &ObjectId, chat_id: &str) -> Result<bool> {
        let res = self
            .raw()
            .update_one(
                doc! {
                    "_id": *id,
                    "chat_id": chat_id,
                    "is_active": true,
                    "kind": { "$ne": ConditionKind::EmaCross.as_str() },
                },
                doc! { "$set": { "is_active": false } },
                None,
            )
            .await?;

        Ok(res.matched_count > 0)
    }

    async fn delete(&self, id: &ObjectId, chat_id: &str) -> Result<bool> {
        let res = self
            .raw()
            .delete_one(doc! { "_id": *id, "chat_id": chat_id }, None)
            .await?;
        Ok(res.deleted_count > 0)
    }

    async fn delete_all_for_chat(&self, chat_id: &str) -> Result<u64> {
        let res = self
            .raw()
            .delete_many(doc! { "chat_id": chat_id }, None)
            .await?;
        Ok(res.deleted_count)
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

// ---------------- In-memory ----------------

/// Same contract as the Mongo store over a process-local map.
#[derive(Default)]
pub struct MemoryNotificationStore {
    items: Mutex<HashMap<ObjectId, Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn load_active(&self) -> Result<Vec<Notification>> {
        Ok(self
            .items
            .lock()
            .values()
            .filter(|n| n.is_active)
            .cloned()
            .collect())
    }

    async fn save(&self, id: &ObjectId, change: &StateChange) -> Result<()> {
        let conflict = || AlertError::PersistenceConflict { id: id.to_hex() };

        let mut items = self.items.lock();
        let n = items.get_mut(id).ok_or_else(conflict)?;

        match change {
            StateChange::Triggered { triggered_at } => {
                if !n.is_active || n.triggered_at.is_some() {
                    return Err(conflict());
                }
                n.is_active = false;
                n.triggered_at = Some(*triggered_at);
            }
            StateChange::Flipped {
                was_above,
                is_above,
                current_ema,
                triggered_at,
            } => {
                let Some(state) = n.ema_cross.as_mut() else {
                    return Err(conflict());
                };
                if n.kind != ConditionKind::EmaCross || state.is_above != *was_above {
                    return Err(conflict());
                }
                state.is_above = *is_above;
                state.current_ema = *current_ema;
                state.updated_at = *triggered_at;
                n.triggered_at = Some(*triggered_at);
            }
        }

        Ok(())
    }

    async fn insert(&self, notification: &Notification) -> Result<()> {
        self.items
            .lock()
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<Notification>> {
        Ok(self.items.lock().get(id).cloned())
    }

    async fn list_for_chat(&self, chat_id: &str, active_only: bool) -> Result<Vec<Notification>> {
        let mut out: Vec<Notification> = self
            .items
            .lock()
            .values()
            .filter(|n| n.chat_id == chat_id && (!active_only || n.is_active))
            .cloned()
            .collect();

        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn deactivate(&self, id: &ObjectId, chat_id: &str) -> Result<bool> {
        let mut items = self.items.lock();
        match items.get_mut(id) {
            Some(n) if n.chat_id == chat_id && n.is_active && n.kind.is_terminal() => {
                n.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &ObjectId, chat_id: &str) -> Result<bool> {
        let mut items = self.items.lock();
        if items.get(id).is_some_and(|n| n.chat_id == chat_id) {
            items.remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_all_for_chat(&self, chat_id: &str) -> Result<u64> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|_, n| n.chat_id != chat_id);
        Ok((before - items.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
