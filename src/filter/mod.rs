//! Task expansion
//!
//! Expansion turns one task into the set of tasks it stands for: the task
//! itself plus derived candidates (extension variants, case variants, robots
//! seeds), minus anything a policy suppresses.
//!
//! - [`ExpandPolicy`]: pure per-task rule, composed with [`PolicyChain`]
//! - [`PolicyRegistry`]: named policies built from [`ScanSettings`](crate::settings::ScanSettings)
//! - [`Expander`]: channel stage that runs a policy over a task stream and
//!   keeps the pending-work counter exact while doing so

mod expander;
mod policy;
mod registry;

pub use expander::{Expander, ExpanderError, Expansion, ExpansionStats, TaskExpander};
pub use policy::{
    CasePolicy, ExpandPolicy, ExpansionError, ExtensionPolicy, IdentityPolicy, PolicyChain,
    RobotsPolicy, StatusPolicy,
};
pub use registry::{PolicyRegistry, RegistryError};
