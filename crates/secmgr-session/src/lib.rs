//! # secmgr-session
//!
//! The authentication session state engine of the security manager.
//!
//! ## Modules
//!
//! - `credential`, `cookie`, `verification`: immutable facts gathered during authentication
//! - `state`: the append-only instruction log, its evolver, and the frozen `Summary`
//! - `snapshot`: point-in-time snapshots with a per-snapshot view cache
//! - `view`: unspecialized, per-mechanism, and per-credential-group projections
//! - `exported`: the flattened credential bundle consumed by the search appliance
//! - `session`: the mutable working session and the session registry

pub mod cookie;
pub mod credential;
pub mod exported;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod verification;
pub mod view;

pub use cookie::Cookie;
pub use credential::{Credential, CredentialKind, Group};
pub use exported::{Credentials, ExportedState};
pub use session::{AuthnSession, SessionManager};
pub use snapshot::{SessionSnapshot, SnapshotBuilder};
pub use state::{AuthnSessionState, Instruction, Operation, Summary};
pub use verification::{Expiration, Verification, VerificationStatus};
pub use view::{AuthorityFilter, SessionView, ViewKind};
