use serde::Serialize;
use sqlx::FromRow;

/// Credential row owned by the user store. Read-only to this service.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRecord {
    #[sqlx(rename = "username")]
    pub login_id: String,
    /// PHC-formatted password hash
    #[sqlx(rename = "password_hash")]
    pub secret_hash: String,
    pub role: String,
    pub customer_id: Option<String>,
}

/// Authenticated principal tokens are minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject: String,
    pub role: String,
    pub customer_id: Option<String>,
}

impl From<&CredentialRecord> for Identity {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            subject: record.login_id.clone(),
            role: record.role.clone(),
            customer_id: record.customer_id.clone(),
        }
    }
}
