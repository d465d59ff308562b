//! In-memory store adapters
//!
//! Used when no database is configured and throughout the tests.

use super::{duplicate_field, Collection, CredentialStore, Document, DocumentStore};
use crate::error::{conflict_error, AppError};
use crate::users::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Accounts {
    identities: HashMap<Uuid, Identity>,
    email_index: HashMap<String, Uuid>,
    username_index: HashMap<String, Uuid>,
}

/// In-memory credential store. Both uniqueness indexes live under one lock
/// so the duplicate check and the insert cannot interleave.
#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: RwLock<Accounts>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Identity>, AppError> {
        let accounts = self.accounts.read().await;
        let id = accounts
            .email_index
            .get(email)
            .or_else(|| accounts.username_index.get(username));
        Ok(id.and_then(|id| accounts.identities.get(id).cloned()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .email_index
            .get(email)
            .and_then(|id| accounts.identities.get(id).cloned()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        Ok(self.accounts.read().await.identities.get(&id).cloned())
    }

    async fn create(&self, identity: Identity) -> Result<Identity, AppError> {
        let mut accounts = self.accounts.write().await;

        if accounts.email_index.contains_key(&identity.email)
            || accounts.username_index.contains_key(&identity.username)
        {
            return Err(conflict_error("User with this email or username already exists"));
        }

        accounts.email_index.insert(identity.email.clone(), identity.id);
        accounts.username_index.insert(identity.username.clone(), identity.id);
        accounts.identities.insert(identity.id, identity.clone());

        Ok(identity)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(identity) = self.accounts.write().await.identities.get_mut(&id) {
            identity.last_login = Some(at);
            identity.updated_at = at;
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Identity>, AppError> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.identities.get_mut(&id).map(|identity| {
            identity.is_active = active;
            identity.updated_at = Utc::now();
            identity.clone()
        }))
    }
}

/// In-memory document store
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, HashMap<Uuid, Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Reject `body` if it repeats a unique field held by another document.
fn check_unique(
    collection: Collection,
    docs: &HashMap<Uuid, Document>,
    body: &Map<String, Value>,
    except: Option<Uuid>,
) -> Result<(), AppError> {
    for field in collection.unique_fields() {
        let Some(value) = body.get(*field) else {
            continue;
        };
        let taken = docs
            .values()
            .any(|doc| Some(doc.id) != except && doc.field(field) == Some(value));
        if taken {
            return Err(duplicate_field(field, value));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, AppError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, AppError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).and_then(|docs| docs.get(&id).cloned()))
    }

    async fn insert(&self, collection: Collection, body: Map<String, Value>) -> Result<Document, AppError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        check_unique(collection, docs, &body, None)?;

        let doc = Document::new(body);
        docs.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        changes: Map<String, Value>,
    ) -> Result<Option<Document>, AppError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(None);
        };
        if !docs.contains_key(&id) {
            return Ok(None);
        }

        check_unique(collection, docs, &changes, Some(id))?;

        Ok(docs.get_mut(&id).map(|doc| {
            doc.body.extend(changes);
            doc.updated_at = Utc::now();
            doc.clone()
        }))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, AppError> {
        let mut collections = self.collections.write().await;
        Ok(collections.get_mut(&collection).and_then(|docs| docs.remove(&id)))
    }
}
