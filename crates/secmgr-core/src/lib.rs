//! # secmgr-core
//!
//! Core crate for the security manager. Contains configuration schemas,
//! typed identifiers, collaborator traits, and the unified error system.
//!
//! This crate has **no** internal dependencies on other security manager crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
