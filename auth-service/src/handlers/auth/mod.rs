pub mod registration;
pub mod session;
pub mod verify;

pub use registration::register;
pub use session::{login, logout, refresh};
pub use verify::verify;
