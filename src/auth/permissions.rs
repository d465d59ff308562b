//! Role-based permission checks
//!
//! Two independent layers: the process-wide [`PermissionMatrix`] gating HTTP
//! operations per role, and a per-resource [`ResourcePolicy`] that handlers
//! apply on top of it.

use crate::auth::{Claims, IdentityContext, Role};
use crate::error::AppError;
use axum::http::Method;
use std::collections::{HashMap, HashSet};

/// Operation kinds a role can be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    /// Map an HTTP method onto the operation it performs.
    ///
    /// Methods outside the CRUD set have no operation and are never granted.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD => Some(Operation::Read),
            Method::POST => Some(Operation::Create),
            Method::PUT | Method::PATCH => Some(Operation::Update),
            Method::DELETE => Some(Operation::Delete),
            _ => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Read)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Role → allowed operations. Built once at startup and only read afterwards.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    grants: HashMap<Role, HashSet<Operation>>,
}

impl PermissionMatrix {
    #[cfg(test)]
    pub fn new(grants: HashMap<Role, HashSet<Operation>>) -> Self {
        Self { grants }
    }

    pub fn allowed(&self, role: Role) -> impl Iterator<Item = Operation> + '_ {
        self.grants.get(&role).into_iter().flatten().copied()
    }

    /// Whether `role` may perform `op`. Roles that are unknown or absent from
    /// the matrix hold the empty set.
    pub fn permits(&self, role: &str, op: Operation) -> bool {
        role.parse::<Role>()
            .ok()
            .and_then(|role| self.grants.get(&role))
            .is_some_and(|ops| ops.contains(&op))
    }

    /// Turn verified claims into an identity context, or reject with 403.
    pub fn authorize(&self, claims: Claims, op: Option<Operation>) -> Result<IdentityContext, AppError> {
        let granted = op.is_some_and(|op| self.permits(&claims.role, op));
        let role = match claims.role.parse::<Role>() {
            Ok(role) if granted => role,
            _ => return Err(insufficient_permissions()),
        };

        Ok(IdentityContext {
            id: claims.sub,
            role,
            email: claims.email,
        })
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        let read_only: HashSet<Operation> = [Operation::Read].into_iter().collect();
        let mut grants = HashMap::new();
        grants.insert(Role::PropertyManager, Operation::ALL.into_iter().collect());
        grants.insert(Role::Finance, read_only.clone());
        grants.insert(Role::Ceo, read_only.clone());
        grants.insert(Role::Assistant, read_only);
        Self { grants }
    }
}

fn insufficient_permissions() -> AppError {
    AppError::Forbidden("Unauthorized: Insufficient permissions".to_string())
}

/// Resource-level rule applied by handlers after the matrix has passed.
#[derive(Debug, Clone, Default)]
pub struct ResourcePolicy {
    /// Roles allowed to create, update or delete. `None` leaves mutations to
    /// the permission matrix alone.
    writers: Option<HashSet<Role>>,
}

impl ResourcePolicy {
    pub fn open() -> Self {
        Self { writers: None }
    }

    pub fn writers(roles: &[Role]) -> Self {
        Self {
            writers: Some(roles.iter().copied().collect()),
        }
    }

    /// Check `ctx` against this policy. `label` is the plural resource name
    /// used in the rejection message.
    pub fn check(&self, ctx: &IdentityContext, op: Operation, label: &str) -> Result<(), AppError> {
        let Some(writers) = &self.writers else {
            return Ok(());
        };
        if !op.is_mutation() || writers.contains(&ctx.role) {
            return Ok(());
        }

        let mut names: Vec<String> = writers
            .iter()
            .map(|role| role.as_str().replace('_', " ") + "s")
            .collect();
        names.sort();
        Err(AppError::Forbidden(format!(
            "Only {} can {} {}",
            names.join(" or "),
            op.verb(),
            label
        )))
    }
}
