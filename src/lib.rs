//! WolfSync - HA File Replication
//!
//! Keeps the standby node of a master/standby PBX pair in step with the
//! master by mirroring a fixed set of configuration directories plus every
//! tenant sound directory over rsync, and bootstraps the SSH trust that the
//! transfer relies on.
//!
//! # Architecture
//!
//! - [`role`] resolves whether this node is the HA master and who its peer is
//! - [`paths`] builds the ordered list of paths to mirror
//! - [`orchestrator`] runs trust bootstrap (`init`) or replication (`sync`)
//! - [`runner`] is the seam to rsync, ssh-keygen and ssh-copy-id
//!
//! Each run is synchronous and independent: it reads configuration and the
//! filesystem fresh, performs at most one mutating external action group and
//! exits.

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod paths;
pub mod role;
pub mod runner;

pub use config::SyncConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SyncConfig;
    pub use crate::error::{Error, Result};
    pub use crate::orchestrator::{Outcome, SyncOrchestrator};
    pub use crate::role::{HaRole, NodeType};
    pub use crate::runner::{CommandRunner, SystemRunner};
}
