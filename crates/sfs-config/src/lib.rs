#![forbid(unsafe_code)]
//! Runtime configuration: the branch set, the global create reserve, the
//! statvfs cache TTL and the policy assigned to each VFS operation.
//!
//! Policy names resolve against the registry at parse time, so a running
//! system never holds an unknown policy name.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sfs_error::SfsError;
use sfs_policy::Policy;
use sfs_probe::FsProbes;
use sfs_types::Branches;
use std::fmt;
use std::time::Duration;

/// Default create reserve: 4 GiB, applied to branches without their own.
pub const DEFAULT_MINFREESPACE: u64 = 4 << 30;

/// Default statvfs cache TTL in seconds.
pub const DEFAULT_STATFS_CACHE_SECS: u64 = 1;

/// A validated policy selection for one operation.
///
/// Holds the resolved registry entry; serialises as the policy's name.
#[derive(Clone, Copy)]
pub struct FuncPolicy {
    policy: &'static dyn Policy,
}

impl FuncPolicy {
    /// Resolve `name` against the policy registry.
    pub fn new(name: &str) -> Result<Self, SfsError> {
        let policy =
            sfs_policy::lookup(name).ok_or_else(|| SfsError::UnknownPolicy(name.to_owned()))?;
        Ok(Self { policy })
    }

    const fn of(policy: &'static dyn Policy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.policy.name()
    }

    #[must_use]
    pub fn policy(&self) -> &'static dyn Policy {
        self.policy
    }
}

impl fmt::Debug for FuncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FuncPolicy").field(&self.name()).finish()
    }
}

impl PartialEq for FuncPolicy {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for FuncPolicy {}

impl Serialize for FuncPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for FuncPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::new(&name).map_err(serde::de::Error::custom)
    }
}

/// Which policy serves each VFS operation.
///
/// Create-class operations default to `epmfs`, action-class to `epall`,
/// search-class to `ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuncConfig {
    // create category
    pub create: FuncPolicy,
    pub mkdir: FuncPolicy,
    pub mknod: FuncPolicy,
    pub symlink: FuncPolicy,
    // action category
    pub chmod: FuncPolicy,
    pub chown: FuncPolicy,
    pub truncate: FuncPolicy,
    pub unlink: FuncPolicy,
    pub utimens: FuncPolicy,
    // search category
    pub access: FuncPolicy,
    pub getattr: FuncPolicy,
    pub open: FuncPolicy,
    pub readlink: FuncPolicy,
}

impl Default for FuncConfig {
    fn default() -> Self {
        let create = FuncPolicy::of(&sfs_policy::EPMFS);
        let action = FuncPolicy::of(&sfs_policy::EPALL);
        let search = FuncPolicy::of(&sfs_policy::FF);
        Self {
            create,
            mkdir: create,
            mknod: create,
            symlink: create,
            chmod: action,
            chown: action,
            truncate: action,
            unlink: action,
            utimens: action,
            access: search,
            getattr: search,
            open: search,
            readlink: search,
        }
    }
}

/// The whole runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub branches: Branches,
    /// Global create reserve for branches without an explicit one.
    pub minfreespace: u64,
    /// statvfs cache TTL in seconds; 0 disables caching.
    pub statfs_cache_secs: u64,
    pub func: FuncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            branches: Branches::default(),
            minfreespace: DEFAULT_MINFREESPACE,
            statfs_cache_secs: DEFAULT_STATFS_CACHE_SECS,
            func: FuncConfig::default(),
        }
    }
}

impl Config {
    /// Build a config from a colon-separated branch list, with defaults for
    /// everything else. Branches without an explicit reserve inherit the
    /// global `minfreespace`.
    pub fn from_branch_list(list: &str) -> Result<Self, SfsError> {
        Self::from_branch_list_with_reserve(list, DEFAULT_MINFREESPACE)
    }

    pub fn from_branch_list_with_reserve(
        list: &str,
        minfreespace: u64,
    ) -> Result<Self, SfsError> {
        let branches = Branches::parse_list(list, minfreespace)?;
        Ok(Self {
            branches,
            minfreespace,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.statfs_cache_secs)
    }

    /// Real filesystem probes configured with this config's cache TTL.
    #[must_use]
    pub fn probes(&self) -> FsProbes {
        FsProbes::new(self.cache_timeout())
    }
}
