//! Mutable authentication sessions and their registry.

pub mod authn;
pub mod manager;

pub use authn::AuthnSession;
pub use manager::SessionManager;
