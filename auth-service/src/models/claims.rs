use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which half of a token pair a set of claims belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Payload carried by every signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (login identifier)
    pub sub: String,
    /// Role the permissions were resolved from
    pub role: String,
    /// Permissions granted to the role at issuance
    pub permissions: BTreeSet<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub kind: TokenKind,
    /// Token family shared by a refresh token, its rotations and the access
    /// tokens they spawned
    pub fam: String,
    /// Token ID. For refresh tokens this is the id tracked per family.
    pub jti: String,
    /// Banking customer the subject is bound to, absent for staff roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl Claims {
    /// Expired once the current time reaches `exp`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// A token bound to a customer may only act for that customer.
    pub fn owns_customer(&self, requested: Option<&str>) -> bool {
        match &self.customer_id {
            Some(own) => requested == Some(own.as_str()),
            None => true,
        }
    }

    /// Route-level check used by the verify endpoint.
    pub fn is_authorized_for(&self, route_name: &str, customer_id: Option<&str>) -> bool {
        self.grants(route_name) && self.owns_customer(customer_id)
    }
}

/// Signed access/refresh pair handed back on login and refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}
