// Postgres-backed store adapters
//
// Identities live in `users`, every document collection shares `records`
// with a JSONB body.

use crate::db::queries;
use crate::error::{conflict_error, AppError};
use crate::store::{duplicate_field, Collection, CredentialStore, Document, DocumentStore};
use crate::users::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde_json::{Map, Value};
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use uuid::Uuid;

fn is_unique_violation(e: &tokio_postgres::Error) -> bool {
    e.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

fn row_to_identity(r: &Row) -> Result<Identity, AppError> {
    let role: String = r.get("role");
    let role = role
        .parse()
        .map_err(|_| AppError::Internal(format!("Stored role '{}' is not recognised", role)))?;

    Ok(Identity {
        id: r.get("id"),
        username: r.get("username"),
        email: r.get("email"),
        password_hash: r.get("password_hash"),
        role,
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        is_active: r.get("is_active"),
        last_login: r.get("last_login"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn row_to_document(r: &Row) -> Result<Document, AppError> {
    let body = match r.get::<_, Value>("body") {
        Value::Object(map) => map,
        other => {
            return Err(AppError::Internal(format!(
                "Stored record body is not an object: {}",
                other
            )))
        }
    };

    Ok(Document {
        id: r.get("id"),
        body,
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

// Credential store on the `users` table
pub struct PgCredentialStore {
    pool: Pool,
}

impl PgCredentialStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<Identity>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&queries::select_user_by_email_or_username(), &[&email, &username])
            .await?;
        row.as_ref().map(row_to_identity).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(&queries::select_user_by_email(), &[&email]).await?;
        row.as_ref().map(row_to_identity).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(&queries::select_user_by_id(), &[&id]).await?;
        row.as_ref().map(row_to_identity).transpose()
    }

    async fn create(&self, identity: Identity) -> Result<Identity, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &queries::insert_user(),
                &[
                    &identity.id,
                    &identity.username,
                    &identity.email,
                    &identity.password_hash,
                    &identity.role.as_str(),
                    &identity.first_name,
                    &identity.last_name,
                    &identity.is_active,
                    &identity.last_login,
                    &identity.created_at,
                    &identity.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    conflict_error("User with this email or username already exists")
                } else {
                    AppError::Database(e)
                }
            })?;

        row_to_identity(&row)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client.execute(queries::UPDATE_LAST_LOGIN, &[&id, &at]).await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Identity>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&queries::update_user_active(), &[&id, &active, &Utc::now()])
            .await?;
        row.as_ref().map(row_to_identity).transpose()
    }
}

// Document store on the shared `records` table
pub struct PgDocumentStore {
    pool: Pool,
}

impl PgDocumentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn map_write_error(collection: Collection, body: &Map<String, Value>, e: tokio_postgres::Error) -> AppError {
        if !is_unique_violation(&e) {
            return AppError::Database(e);
        }
        collection
            .unique_fields()
            .iter()
            .find_map(|field| body.get(*field).map(|value| duplicate_field(field, value)))
            .unwrap_or_else(|| conflict_error("Record already exists"))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::SELECT_RECORDS, &[&collection.name()]).await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::SELECT_RECORD, &[&collection.name(), &id])
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn insert(&self, collection: Collection, body: Map<String, Value>) -> Result<Document, AppError> {
        let client = self.pool.get().await?;
        let json = Value::Object(body.clone());
        let row = client
            .query_one(
                queries::INSERT_RECORD,
                &[&Uuid::new_v4(), &collection.name(), &json, &Utc::now()],
            )
            .await
            .map_err(|e| Self::map_write_error(collection, &body, e))?;

        row_to_document(&row)
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        changes: Map<String, Value>,
    ) -> Result<Option<Document>, AppError> {
        let client = self.pool.get().await?;
        let json = Value::Object(changes.clone());
        let row = client
            .query_opt(
                queries::UPDATE_RECORD,
                &[&collection.name(), &id, &json, &Utc::now()],
            )
            .await
            .map_err(|e| Self::map_write_error(collection, &changes, e))?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::DELETE_RECORD, &[&collection.name(), &id])
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }
}
