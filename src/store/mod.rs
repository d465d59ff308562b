//! Storage seams
//!
//! The credential store and the document store are external collaborators.
//! Handlers and the auth core only see these traits; `memory` and
//! `crate::db::service` provide the concrete adapters.

mod memory;

pub use memory::{MemoryCredentialStore, MemoryDocumentStore};

use crate::error::AppError;
use crate::users::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Lookup and persistence of identities
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Single lookup matching either the email or the username.
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Identity>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    /// Persist a new identity. Fails with [`AppError::Conflict`] when the
    /// email or username is already taken; check and insert are atomic.
    async fn create(&self, identity: Identity) -> Result<Identity, AppError>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Identity>, AppError>;
}

/// Named document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Properties,
    InsuredCars,
    PropertyInsured,
    InsuredCover,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Properties => "properties",
            Collection::InsuredCars => "insuredcars",
            Collection::PropertyInsured => "propertyinsured",
            Collection::InsuredCover => "insuredcover",
        }
    }

    /// Body fields whose value must be unique within the collection
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Properties => &["propertyRef"],
            _ => &[],
        }
    }
}

/// A stored record: an opaque JSON object keyed by ID
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub body: Map<String, Value>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(body: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}

/// Collection-scoped CRUD over documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, AppError>;

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, AppError>;

    async fn insert(&self, collection: Collection, body: Map<String, Value>) -> Result<Document, AppError>;

    /// Shallow-merge `changes` into the stored body. `None` if absent.
    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        changes: Map<String, Value>,
    ) -> Result<Option<Document>, AppError>;

    /// Remove and return the document. `None` if absent.
    async fn delete(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, AppError>;
}

pub(crate) fn duplicate_field(field: &str, value: &Value) -> AppError {
    let shown = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    AppError::Conflict(format!("{} '{}' already exists", field, shown))
}
