//! Role to permission table.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use super::AuthError;

/// Immutable mapping from role identifier to the permissions it grants.
///
/// Built once at startup and shared behind an `Arc`; there is no mutation
/// after construction so concurrent reads need no locking.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    roles: Arc<HashMap<String, BTreeSet<String>>>,
}

impl PermissionRegistry {
    pub fn new<R, P, I>(roles: R) -> Self
    where
        R: IntoIterator<Item = (String, P)>,
        P: IntoIterator<Item = I>,
        I: Into<String>,
    {
        let roles = roles
            .into_iter()
            .map(|(role, permissions)| {
                (role, permissions.into_iter().map(Into::into).collect())
            })
            .collect();

        Self {
            roles: Arc::new(roles),
        }
    }

    /// Route permissions of the banking API.
    pub fn banking_defaults() -> Self {
        Self::new([
            (
                "admin".to_string(),
                vec!["GetAllCustomers", "GetCustomer", "NewAccount", "NewTransaction"],
            ),
            ("user".to_string(), vec!["GetCustomer", "NewTransaction"]),
        ])
    }

    /// Load a table shaped like `{"role": ["permission", ...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read role permissions from {}: {}", path.display(), e)
        })?;
        let table: HashMap<String, Vec<String>> = serde_json::from_str(&raw).map_err(|e| {
            anyhow::anyhow!("Failed to parse role permissions in {}: {}", path.display(), e)
        })?;

        if table.is_empty() {
            return Err(anyhow::anyhow!(
                "Role permissions file {} defines no roles",
                path.display()
            ));
        }

        Ok(Self::new(table))
    }

    pub fn permissions_for_role(&self, role: &str) -> Result<BTreeSet<String>, AuthError> {
        self.roles
            .get(role)
            .cloned()
            .ok_or_else(|| AuthError::UnknownRole(role.to_string()))
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}
