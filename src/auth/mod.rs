//! Authentication and authorization module
//!
//! Provides JWT-based authentication, bcrypt password hashing and
//! role-based access control over HTTP operations.

mod jwt;
mod middleware;
mod password;
mod permissions;
mod service;

pub use jwt::{Claims, TokenCodec};
pub use middleware::{authorize, bearer_token};
pub use password::PasswordHasher;
pub use permissions::{Operation, PermissionMatrix, ResourcePolicy};
pub use service::{AuthService, AuthSession, LoginRequest, RegisterRequest};

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full create/read/update/delete access
    PropertyManager,
    Finance,
    Ceo,
    Assistant,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::PropertyManager, Role::Finance, Role::Ceo, Role::Assistant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::PropertyManager => "property_manager",
            Role::Finance => "finance",
            Role::Ceo => "ceo",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or(crate::error::AppError::InvalidRole)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified caller identity handed to downstream handlers.
///
/// Only ever built by the authorization middleware after the token checked
/// out and the role was granted the requested operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub id: Uuid,
    pub role: Role,
    pub email: String,
}
