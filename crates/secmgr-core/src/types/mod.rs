//! Shared value types used across security manager crates.

pub mod authority;
pub mod id;

pub use authority::Authority;
pub use id::SessionId;
