#![forbid(unsafe_code)]
//! SeamFS public API facade.
//!
//! Re-exports the branch model, probes, policy engine, configuration and
//! operation harness through one crate for downstream consumers.

pub use sfs_config::{Config, DEFAULT_MINFREESPACE, FuncConfig, FuncPolicy};
pub use sfs_error::{Errno, SfsError};
pub use sfs_policy::{POLICIES, PathList, Policy, SelectionError, dispatch, lookup};
pub use sfs_probe::{FixedProbes, FsInfo, FsProbes, Probes, StatvfsCache, branch_path};
pub use sfs_types::{Branch, BranchMode, Branches, Category, parse_size};

pub mod ops {
    pub use sfs_ops::*;
}
