//! Session store and data model (C3).

pub mod store;
pub mod types;

pub use store::SessionStore;
pub use types::{Action, AgentSession, Capability, HealthCheck, SessionState};
