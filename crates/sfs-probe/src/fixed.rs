use crate::{FsInfo, Probes};
use sfs_error::Errno;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default)]
struct FixedBranch {
    info: Option<Result<FsInfo, Errno>>,
    files: BTreeSet<String>,
    modtimes: BTreeMap<String, SystemTime>,
}

/// An in-memory probe oracle with fixed answers.
///
/// Used by the policy tests and the scan bench: the engine is a pure
/// function of (branches, fusepath, probe results), so a fixed oracle makes
/// every selection deterministic and repeatable.
///
/// Cached and uncached space probes answer from the same [`FsInfo`]; a
/// branch configured with [`FixedProbes::branch_err`] fails `info` and
/// skips silently on the cached variants, matching the probe contract.
#[derive(Debug, Clone, Default)]
pub struct FixedProbes {
    branches: HashMap<PathBuf, FixedBranch>,
}

impl FixedProbes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the statvfs answer for a branch.
    #[must_use]
    pub fn branch(mut self, path: impl Into<PathBuf>, info: FsInfo) -> Self {
        self.branches.entry(path.into()).or_default().info = Some(Ok(info));
        self
    }

    /// Make every `info` probe against a branch fail with `errno`.
    #[must_use]
    pub fn branch_err(mut self, path: impl Into<PathBuf>, errno: Errno) -> Self {
        self.branches.entry(path.into()).or_default().info = Some(Err(errno));
        self
    }

    /// Mark `fusepath` as existing on a branch.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>, fusepath: &str) -> Self {
        self.branches
            .entry(path.into())
            .or_default()
            .files
            .insert(fusepath.to_owned());
        self
    }

    /// Mark `fusepath` as existing with an explicit modification time.
    #[must_use]
    pub fn file_with_modtime(
        mut self,
        path: impl Into<PathBuf>,
        fusepath: &str,
        modtime: SystemTime,
    ) -> Self {
        let entry = self.branches.entry(path.into()).or_default();
        entry.files.insert(fusepath.to_owned());
        entry.modtimes.insert(fusepath.to_owned(), modtime);
        self
    }
}

impl Probes for FixedProbes {
    fn exists(&self, branch: &Path, fusepath: &str) -> bool {
        self.branches
            .get(branch)
            .is_some_and(|b| b.files.contains(fusepath))
    }

    fn info(&self, branch: &Path) -> Result<FsInfo, Errno> {
        match self.branches.get(branch).and_then(|b| b.info) {
            Some(result) => result,
            None => Err(Errno::ENOENT),
        }
    }

    fn spaceavail_cached(&self, branch: &Path) -> Option<u64> {
        self.info(branch).ok().map(|info| info.spaceavail)
    }

    fn spaceused_cached(&self, branch: &Path) -> Option<u64> {
        self.info(branch).ok().map(|info| info.spaceused)
    }

    fn modtime(&self, branch: &Path, fusepath: &str) -> Option<SystemTime> {
        let entry = self.branches.get(branch)?;
        if !entry.files.contains(fusepath) {
            return None;
        }
        Some(
            entry
                .modtimes
                .get(fusepath)
                .copied()
                .unwrap_or(UNIX_EPOCH),
        )
    }
}
