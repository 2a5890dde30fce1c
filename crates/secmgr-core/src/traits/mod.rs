//! Collaborator traits defined in `secmgr-core` and implemented by callers.

pub mod clock;

pub use clock::{Clock, FixedClock, SystemClock};
