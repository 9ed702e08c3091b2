#![forbid(unsafe_code)]
//! Branch-selection policies.
//!
//! For every operation on the union, a policy decides which branch(es)
//! service the request. Each policy exposes three entry points, one per
//! [`Category`]:
//!
//! - CREATE selects the branch that will host a new object,
//! - ACTION selects the branches where an existing object is modified,
//! - SEARCH selects the branches where an existing object is read.
//!
//! The branch set is scanned in user-supplied order under its read lock;
//! the lock is released on every exit path when the guard drops. Ranked
//! policies compare strictly so the first branch wins ties. CREATE and
//! ACTION use the authoritative `info` probe; SEARCH goes through the
//! cached statvfs layer.
//!
//! Policies are pure functions of (branches, fusepath, probe results at
//! call time): no hidden state, no memoisation across calls.

mod error;
mod multi;
mod ranked;

pub use error::SelectionError;
pub use multi::{AllPolicy, RandPolicy};
pub use ranked::{CheckOrder, Direction, FirstFoundPolicy, Metric, RankedPolicy};

use sfs_error::Errno;
use sfs_probe::Probes;
use sfs_types::{Branches, Category};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Ordered branch base paths. Non-empty on success; paths are not joined
/// with the fusepath.
pub type PathList = Vec<PathBuf>;

/// A named branch-selection algorithm: a triplet of create / action /
/// search behaviours.
pub trait Policy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Select branch(es) to host a new object.
    ///
    /// `minfreespace` is a global reserve override; `None` applies each
    /// branch's own reserve.
    fn create(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
        minfreespace: Option<u64>,
    ) -> Result<PathList, Errno>;

    /// Select branch(es) where an existing object will be modified.
    fn action(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno>;

    /// Select branch(es) where an existing object will be read.
    fn search(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno>;
}

/// Unconditionally refuses with `EROFS`. Assigning it to an operation
/// disables that operation across the whole union.
#[derive(Debug)]
pub struct ErofsPolicy {
    name: &'static str,
}

impl Policy for ErofsPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn create(
        &self,
        _branches: &Branches,
        _probes: &dyn Probes,
        _fusepath: &str,
        _minfreespace: Option<u64>,
    ) -> Result<PathList, Errno> {
        Err(Errno::EROFS)
    }

    fn action(
        &self,
        _branches: &Branches,
        _probes: &dyn Probes,
        _fusepath: &str,
    ) -> Result<PathList, Errno> {
        Err(Errno::EROFS)
    }

    fn search(
        &self,
        _branches: &Branches,
        _probes: &dyn Probes,
        _fusepath: &str,
    ) -> Result<PathList, Errno> {
        Err(Errno::EROFS)
    }
}

// ── The policy family ───────────────────────────────────────────────────────
//
// ep- ("existing path") variants require the fusepath to already exist on a
// branch before CREATE will consider it; their non-ep counterparts place new
// objects anywhere. ACTION and SEARCH always require existence.

/// Every qualifying branch, in branch order.
pub static ALL: AllPolicy = AllPolicy {
    name: "all",
    existing_path: false,
};
/// Existing path: every qualifying branch holding the path.
pub static EPALL: AllPolicy = AllPolicy {
    name: "epall",
    existing_path: true,
};
/// Existing path, first found.
pub static EPFF: FirstFoundPolicy = FirstFoundPolicy {
    name: "epff",
    existing_path: true,
};
/// Existing path, least free space.
pub static EPLFS: RankedPolicy = RankedPolicy {
    name: "eplfs",
    metric: Metric::SpaceAvail,
    direction: Direction::Min,
    existing_path: true,
    order: CheckOrder::ModeFirst,
};
/// Existing path, least used space.
pub static EPLUS: RankedPolicy = RankedPolicy {
    name: "eplus",
    metric: Metric::SpaceUsed,
    direction: Direction::Min,
    existing_path: true,
    order: CheckOrder::ModeFirst,
};
/// Existing path, most free space. Probes existence before the branch
/// mode, so a branch missing the path surfaces `ENOENT` even when it is
/// also mode-excluded.
pub static EPMFS: RankedPolicy = RankedPolicy {
    name: "epmfs",
    metric: Metric::SpaceAvail,
    direction: Direction::Max,
    existing_path: true,
    order: CheckOrder::ExistsFirst,
};
/// Existing path, random qualifying branch.
pub static EPRAND: RandPolicy = RandPolicy {
    name: "eprand",
    inner: &EPALL,
};
/// Always `EROFS`.
pub static EROFS: ErofsPolicy = ErofsPolicy { name: "erofs" };
/// First found.
pub static FF: FirstFoundPolicy = FirstFoundPolicy {
    name: "ff",
    existing_path: false,
};
/// Least free space.
pub static LFS: RankedPolicy = RankedPolicy {
    name: "lfs",
    metric: Metric::SpaceAvail,
    direction: Direction::Min,
    existing_path: false,
    order: CheckOrder::ModeFirst,
};
/// Least used space.
pub static LUS: RankedPolicy = RankedPolicy {
    name: "lus",
    metric: Metric::SpaceUsed,
    direction: Direction::Min,
    existing_path: false,
    order: CheckOrder::ModeFirst,
};
/// Most free space.
pub static MFS: RankedPolicy = RankedPolicy {
    name: "mfs",
    metric: Metric::SpaceAvail,
    direction: Direction::Max,
    existing_path: false,
    order: CheckOrder::ModeFirst,
};
/// Most recently modified copy of the path. The metric lives on the path
/// itself, so existence is probed first.
pub static NEWEST: RankedPolicy = RankedPolicy {
    name: "newest",
    metric: Metric::ModTime,
    direction: Direction::Max,
    existing_path: true,
    order: CheckOrder::ExistsFirst,
};
/// Random qualifying branch.
pub static RAND: RandPolicy = RandPolicy {
    name: "rand",
    inner: &ALL,
};

/// Every known policy, by name.
pub static POLICIES: [&'static dyn Policy; 14] = [
    &ALL, &EPALL, &EPFF, &EPLFS, &EPLUS, &EPMFS, &EPRAND, &EROFS, &FF, &LFS, &LUS, &MFS, &NEWEST,
    &RAND,
];

/// Look a policy up by its configuration token.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static dyn Policy> {
    POLICIES.iter().copied().find(|p| p.name() == name)
}

/// Resolve `name` and invoke its `category` entry point.
///
/// Dispatch happens once here; the per-branch loop inside the policy is
/// monomorphic. Unknown names answer `EINVAL`; selection failures are
/// surfaced as-is, with no fallback across policies.
pub fn dispatch(
    name: &str,
    category: Category,
    branches: &Branches,
    probes: &dyn Probes,
    fusepath: &str,
    minfreespace: Option<u64>,
) -> Result<PathList, Errno> {
    let Some(policy) = lookup(name) else {
        warn!(policy = name, "unknown policy");
        return Err(Errno::EINVAL);
    };

    let result = match category {
        Category::Create => policy.create(branches, probes, fusepath, minfreespace),
        Category::Action => policy.action(branches, probes, fusepath),
        Category::Search => policy.search(branches, probes, fusepath),
    };

    if let Err(errno) = &result {
        debug!(policy = name, %category, fusepath, %errno, "no branch selected");
    }
    result
}
