pub mod password;
pub mod validation;

pub use password::{
    decoy_password_hash, hash_password, verify_password, Password, PasswordHashString,
};
pub use validation::ValidatedJson;
