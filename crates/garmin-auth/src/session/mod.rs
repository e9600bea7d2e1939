//! Session lifecycle: login, MFA, refresh, persistence.

pub mod manager;
pub mod store;

pub use manager::{AuthPhase, LoginOutcome, SessionManager};
pub use store::SessionStore;
