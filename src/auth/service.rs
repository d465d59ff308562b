//! Registration, login and identity verification
//!
//! Owns the password hasher, the token codec and the credential store
//! handle. Every store call is bounded by the configured timeout.

use super::password::MAX_PASSWORD_BYTES;
use crate::auth::{PasswordHasher, Role, TokenCodec};
use crate::config::AuthConfig;
use crate::error::{AppError, AuthError};
use crate::store::CredentialStore;
use crate::users::{Identity, IdentityView};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Registration payload. Every field is optional on the wire so that all
/// missing ones can be reported together.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl RegisterRequest {
    /// Wire names of every absent or empty field, in declaration order.
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
            ("role", &self.role),
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
        ]
        .into_iter()
        .filter(|(_, value)| present(value).is_none())
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Token plus sanitized identity, returned by register and login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: IdentityView,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    codec: TokenCodec,
    store_timeout: Duration,
    /// Hash checked when no account matches, so unknown emails cost the same
    /// bcrypt work as wrong passwords
    decoy_hash: Arc<OnceCell<String>>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(config.bcrypt_cost, config.hash_workers),
            codec: TokenCodec::new(config.jwt_secret.as_bytes()),
            store_timeout: config.store_timeout,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| AppError::Internal("Credential store call timed out".to_string()))?
    }

    fn session(&self, identity: &Identity) -> Result<AuthSession, AppError> {
        Ok(AuthSession {
            token: self.codec.issue(identity.id, identity.role, &identity.email)?,
            token_type: "Bearer",
            expires_in: self.codec.expires_in(),
            user: IdentityView::from(identity),
        })
    }

    /// Validate, enforce uniqueness, persist and issue a token.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AppError> {
        let (
            Some(username),
            Some(email),
            Some(password),
            Some(role),
            Some(first_name),
            Some(last_name),
        ) = (
            present(&req.username),
            present(&req.email),
            present(&req.password),
            present(&req.role),
            present(&req.first_name),
            present(&req.last_name),
        )
        else {
            let missing = req.missing_fields();
            debug!("Registration missing fields: {:?}", missing);
            return Err(AppError::MissingFields(missing));
        };

        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation(format!(
                "Password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        let role: Role = role.parse().inspect_err(|_| debug!("Rejected role '{}'", role))?;

        if let Some(existing) = self
            .bounded(self.store.find_by_email_or_username(email, username))
            .await?
        {
            debug!("Registration clashes with identity {}", existing.id);
            return Err(AppError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(password).await?;
        let identity = Identity::new(
            username.to_string(),
            email.to_string(),
            password_hash,
            role,
            first_name.to_string(),
            last_name.to_string(),
        );

        // The store re-checks uniqueness atomically, closing the race with a
        // concurrent registration.
        let identity = self.bounded(self.store.create(identity)).await?;
        info!("User registered: {} ({})", identity.username, identity.role);

        self.session(&identity)
    }

    /// Check credentials and account status, stamp the login, issue a token.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, AppError> {
        let (Some(email), Some(password)) = (present(&req.email), present(&req.password)) else {
            return Err(AppError::Validation("Email and password are required".to_string()));
        };

        let Some(identity) = self.bounded(self.store.find_by_email(email)).await? else {
            debug!("Login for unknown email");
            let decoy = self
                .decoy_hash
                .get_or_try_init(|| self.hasher.hash("decoy-password"))
                .await?;
            self.hasher.verify(password, decoy).await?;
            return Err(AuthError::InvalidCredentials.into());
        };

        if !identity.is_active {
            warn!("Login attempt on deactivated account {}", identity.id);
            return Err(AuthError::Deactivated.into());
        }

        if !self.hasher.verify(password, &identity.password_hash).await? {
            debug!("Login with wrong password for {}", identity.id);
            return Err(AuthError::InvalidCredentials.into());
        }

        let now = Utc::now();
        self.bounded(self.store.record_login(identity.id, now)).await?;
        let identity = Identity {
            last_login: Some(now),
            ..identity
        };
        info!("User logged in: {}", identity.username);

        self.session(&identity)
    }

    /// Resolve a bearer token back to the stored identity.
    pub async fn verify_identity(&self, token: Option<&str>) -> Result<IdentityView, AppError> {
        let token = token.ok_or(AuthError::NoToken)?;
        let claims = self.codec.verify(token)?;

        let identity = self
            .bounded(self.store.find_by_id(claims.sub))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !identity.is_active {
            return Err(AuthError::Deactivated.into());
        }

        Ok(IdentityView::from(&identity))
    }
}
