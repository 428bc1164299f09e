pub mod claims;
pub mod identity;

pub use claims::{Claims, TokenKind, TokenPair};
pub use identity::{CredentialRecord, Identity};
