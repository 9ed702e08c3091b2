#![forbid(unsafe_code)]
//! Filesystem probes backing the policy engine.
//!
//! Policies never touch the filesystem directly; they go through the
//! [`Probes`] trait. [`FsProbes`] is the real implementation (statvfs +
//! lstat); [`FixedProbes`] is an in-memory oracle for tests and benches.
//!
//! The cached space probes exist for the SEARCH category, where stale data
//! is tolerable because the target already exists. CREATE and ACTION must
//! use the authoritative [`Probes::info`].

mod cache;
mod fixed;

pub use cache::StatvfsCache;
pub use fixed::FixedProbes;

use nix::sys::stat;
use nix::sys::statvfs::{FsFlags, statvfs};
use serde::Serialize;
use sfs_error::Errno;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Space and writability of the filesystem backing a branch.
///
/// `readonly` reflects the underlying mount, independent of the branch's
/// configured mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FsInfo {
    /// Bytes free to an unprivileged writer.
    pub spaceavail: u64,
    /// Bytes currently consumed.
    pub spaceused: u64,
    pub readonly: bool,
}

/// The probe contract the policy engine depends on.
pub trait Probes: Send + Sync {
    /// Whether `fusepath` exists under `branch`. Absence and probe failure
    /// both answer `false`.
    fn exists(&self, branch: &Path, fusepath: &str) -> bool;

    /// Authoritative space/writability data for the branch mount.
    fn info(&self, branch: &Path) -> Result<FsInfo, Errno>;

    /// Cached `spaceavail`; `None` means the branch is skipped silently.
    fn spaceavail_cached(&self, branch: &Path) -> Option<u64>;

    /// Cached `spaceused`; `None` means the branch is skipped silently.
    fn spaceused_cached(&self, branch: &Path) -> Option<u64>;

    /// Modification time of `fusepath` on `branch`, if it exists.
    fn modtime(&self, branch: &Path, fusepath: &str) -> Option<SystemTime>;
}

/// Join a branch base path with a path inside the union.
#[must_use]
pub fn branch_path(branch: &Path, fusepath: &str) -> PathBuf {
    branch.join(fusepath.trim_start_matches('/'))
}

#[allow(clippy::unnecessary_cast)] // fsblkcnt_t / c_ulong widths vary by platform
pub(crate) fn read_statvfs(path: &Path) -> Result<FsInfo, Errno> {
    let vfs = statvfs(path).map_err(|err| Errno(err as i32))?;

    let frsize = vfs.fragment_size() as u64;
    let blocks = vfs.blocks() as u64;
    let bfree = vfs.blocks_free() as u64;
    let bavail = vfs.blocks_available() as u64;

    Ok(FsInfo {
        spaceavail: bavail.saturating_mul(frsize),
        spaceused: blocks.saturating_sub(bfree).saturating_mul(frsize),
        readonly: vfs.flags().contains(FsFlags::ST_RDONLY),
    })
}

/// Probes against the real filesystem.
///
/// `info` issues a fresh statvfs on every call; the cached variants share a
/// [`StatvfsCache`] so concurrent SEARCH scans amortise the syscall.
#[derive(Debug)]
pub struct FsProbes {
    cache: StatvfsCache,
}

impl FsProbes {
    #[must_use]
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            cache: StatvfsCache::new(cache_ttl),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &StatvfsCache {
        &self.cache
    }
}

impl Probes for FsProbes {
    fn exists(&self, branch: &Path, fusepath: &str) -> bool {
        stat::lstat(&branch_path(branch, fusepath)).is_ok()
    }

    fn info(&self, branch: &Path) -> Result<FsInfo, Errno> {
        read_statvfs(branch).inspect_err(|errno| {
            debug!(branch = %branch.display(), %errno, "statvfs probe failed");
        })
    }

    fn spaceavail_cached(&self, branch: &Path) -> Option<u64> {
        self.cache.lookup(branch).map(|info| info.spaceavail)
    }

    fn spaceused_cached(&self, branch: &Path) -> Option<u64> {
        self.cache.lookup(branch).map(|info| info.spaceused)
    }

    fn modtime(&self, branch: &Path, fusepath: &str) -> Option<SystemTime> {
        let st = stat::lstat(&branch_path(branch, fusepath)).ok()?;
        let secs = u64::try_from(st.st_mtime).unwrap_or(0);
        let nanos = u32::try_from(st.st_mtime_nsec).unwrap_or(0);
        UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
    }
}
