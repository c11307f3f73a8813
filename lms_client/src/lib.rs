pub mod commands;
pub mod models;
pub mod session;

pub use models::{AuthEnvelope, Identity, Role};
pub use session::{SessionError, SessionState, SessionStore};
