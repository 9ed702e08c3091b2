#![forbid(unsafe_code)]
//! Per-operation harness.
//!
//! Each operation asks the configured policy for a list of branch base
//! paths, applies the underlying syscall per base path and folds the
//! per-branch return codes into a single result: if any branch succeeds
//! the operation succeeds, otherwise the last failing errno is surfaced.
//!
//! CREATE-category operations select on the parent directory of the new
//! object; the object itself does not exist yet.

pub use nix::sys::stat::{FileStat, Mode};
pub use nix::sys::time::TimeSpec;
pub use nix::unistd::{Gid, Uid};

use nix::sys::stat::{self, FchmodatFlags, UtimensatFlags};
use nix::unistd::{self, FchownatFlags};
use sfs_config::Config;
use sfs_error::Errno;
use sfs_policy::PathList;
use sfs_probe::{Probes, branch_path};
use std::path::Path;
use tracing::trace;

/// Folds per-branch return codes into one aggregate result.
///
/// A success is sticky: once any branch succeeds the aggregate stays
/// successful. Failures keep the most recent errno, so with no success
/// the caller sees the last branch's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpFold {
    state: FoldState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FoldState {
    #[default]
    Empty,
    Succeeded,
    Failed(Errno),
}

impl OpFold {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: Result<(), Errno>) {
        self.state = match (self.state, result) {
            (FoldState::Succeeded, _) => FoldState::Succeeded,
            (_, Ok(())) => FoldState::Succeeded,
            (_, Err(errno)) => FoldState::Failed(errno),
        };
    }

    /// Recording nothing at all answers `ENOENT`; the dispatcher never
    /// hands out an empty path list, so this is a defensive floor.
    pub fn finish(self) -> Result<(), Errno> {
        match self.state {
            FoldState::Empty => Err(Errno::ENOENT),
            FoldState::Succeeded => Ok(()),
            FoldState::Failed(errno) => Err(errno),
        }
    }
}

fn errno(err: nix::errno::Errno) -> Errno {
    Errno(err as i32)
}

/// Parent directory of a path inside the union.
#[must_use]
pub fn dirname(fusepath: &str) -> &str {
    match fusepath.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(index) => &fusepath[..index],
    }
}

fn fan_out(
    paths: &PathList,
    fusepath: &str,
    mut op: impl FnMut(&Path) -> Result<(), Errno>,
) -> Result<(), Errno> {
    let mut fold = OpFold::new();
    for base in paths {
        let full = branch_path(base, fusepath);
        let result = op(&full);
        trace!(path = %full.display(), ok = result.is_ok(), "branch op");
        fold.record(result);
    }
    fold.finish()
}

/// Set file times, symlink-safe (the original's `lutimens`).
pub fn utimens(
    config: &Config,
    probes: &dyn Probes,
    fusepath: &str,
    atime: TimeSpec,
    mtime: TimeSpec,
) -> Result<(), Errno> {
    let policy = config.func.utimens.policy();
    let paths = policy.action(&config.branches, probes, fusepath)?;
    fan_out(&paths, fusepath, |full| {
        stat::utimensat(None, full, &atime, &mtime, UtimensatFlags::NoFollowSymlink)
            .map_err(errno)
    })
}

pub fn chmod(
    config: &Config,
    probes: &dyn Probes,
    fusepath: &str,
    mode: Mode,
) -> Result<(), Errno> {
    let policy = config.func.chmod.policy();
    let paths = policy.action(&config.branches, probes, fusepath)?;
    fan_out(&paths, fusepath, |full| {
        stat::fchmodat(None, full, mode, FchmodatFlags::FollowSymlink).map_err(errno)
    })
}

pub fn chown(
    config: &Config,
    probes: &dyn Probes,
    fusepath: &str,
    owner: Option<Uid>,
    group: Option<Gid>,
) -> Result<(), Errno> {
    let policy = config.func.chown.policy();
    let paths = policy.action(&config.branches, probes, fusepath)?;
    fan_out(&paths, fusepath, |full| {
        unistd::fchownat(None, full, owner, group, FchownatFlags::NoFollowSymlink)
            .map_err(errno)
    })
}

pub fn truncate(
    config: &Config,
    probes: &dyn Probes,
    fusepath: &str,
    length: i64,
) -> Result<(), Errno> {
    let policy = config.func.truncate.policy();
    let paths = policy.action(&config.branches, probes, fusepath)?;
    fan_out(&paths, fusepath, |full| {
        unistd::truncate(full, length).map_err(errno)
    })
}

pub fn unlink(config: &Config, probes: &dyn Probes, fusepath: &str) -> Result<(), Errno> {
    let policy = config.func.unlink.policy();
    let paths = policy.action(&config.branches, probes, fusepath)?;
    fan_out(&paths, fusepath, |full| {
        unistd::unlink(full).map_err(errno)
    })
}

/// Create a directory on the branch(es) selected for the parent path.
pub fn mkdir(
    config: &Config,
    probes: &dyn Probes,
    fusepath: &str,
    mode: Mode,
) -> Result<(), Errno> {
    let policy = config.func.mkdir.policy();
    let paths = policy.create(&config.branches, probes, dirname(fusepath), None)?;
    fan_out(&paths, fusepath, |full| {
        unistd::mkdir(full, mode).map_err(errno)
    })
}

/// Stat the first branch the search policy finds the path on.
pub fn getattr(
    config: &Config,
    probes: &dyn Probes,
    fusepath: &str,
) -> Result<FileStat, Errno> {
    let policy = config.func.getattr.policy();
    let paths = policy.search(&config.branches, probes, fusepath)?;
    let base = paths.first().ok_or(Errno::ENOENT)?;
    stat::lstat(&branch_path(base, fusepath)).map_err(errno)
}
