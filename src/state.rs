//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::auth::{AuthService, PermissionMatrix, ResourcePolicy, Role};
use crate::config::AuthConfig;
use crate::store::{Collection, CredentialStore, DocumentStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-collection resource policies, configured independently of the
/// permission matrix
#[derive(Debug, Clone)]
pub struct ResourcePolicies {
    policies: HashMap<Collection, ResourcePolicy>,
}

impl ResourcePolicies {
    pub fn with(mut self, collection: Collection, policy: ResourcePolicy) -> Self {
        self.policies.insert(collection, policy);
        self
    }

    /// Policy for `collection`; open when none was configured.
    pub fn get(&self, collection: Collection) -> ResourcePolicy {
        self.policies.get(&collection).cloned().unwrap_or_default()
    }
}

impl Default for ResourcePolicies {
    fn default() -> Self {
        Self {
            policies: HashMap::new(),
        }
        .with(Collection::Properties, ResourcePolicy::writers(&[Role::PropertyManager]))
        .with(Collection::InsuredCars, ResourcePolicy::open())
        .with(Collection::PropertyInsured, ResourcePolicy::open())
        .with(Collection::InsuredCover, ResourcePolicy::open())
    }
}

/// Application state shared across all handlers
pub struct AppState {
    /// Registration, login and token verification
    pub auth: AuthService,

    /// Backing store for every resource collection
    pub records: Arc<dyn DocumentStore>,

    /// Role → operation grants, read-only after startup
    pub permissions: PermissionMatrix,

    pub policies: ResourcePolicies,
}

impl AppState {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        records: Arc<dyn DocumentStore>,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            auth: AuthService::new(credentials, auth),
            records,
            permissions: PermissionMatrix::default(),
            policies: ResourcePolicies::default(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
