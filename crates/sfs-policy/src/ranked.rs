//! Single-winner policies: ranked scans and first-found.
//!
//! A ranked policy scans the branch set in order, applies the category
//! predicates and keeps the branch with the strictly best metric. Strict
//! comparison preserves the first winner on ties, so the user's branch
//! order is a deterministic tie-break. That is a documented contract, not
//! an accident.

use crate::error::SelectionError;
use crate::{PathList, Policy};
use sfs_error::Errno;
use sfs_probe::{FsInfo, Probes};
use sfs_types::{Branch, Branches};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// The quantity a ranked policy measures on each qualifying branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    SpaceAvail,
    SpaceUsed,
    ModTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Min,
    Max,
}

/// Which exclusion fires first when a branch is both mode-excluded and
/// missing the path.
///
/// Only the first failing predicate per branch feeds the error
/// accumulator, so the order is visible in the surfaced errno when the
/// sole candidate is excluded for both reasons at once. `eplus` excludes
/// on mode before probing existence; `epmfs` probes existence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOrder {
    ModeFirst,
    ExistsFirst,
}

/// Modification time as a comparable nanosecond count; `None` when the
/// path is absent. Pre-epoch times clamp to zero.
fn modtime_value(probes: &dyn Probes, branch: &Path, fusepath: &str) -> Option<u64> {
    let modtime = probes.modtime(branch, fusepath)?;
    let since_epoch = modtime.duration_since(UNIX_EPOCH).unwrap_or_default();
    Some(u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX))
}

#[derive(Debug)]
pub struct RankedPolicy {
    pub(crate) name: &'static str,
    pub(crate) metric: Metric,
    pub(crate) direction: Direction,
    /// Whether CREATE requires `fusepath` to already exist on the branch
    /// (the `ep` prefix). ACTION and SEARCH always require existence.
    pub(crate) existing_path: bool,
    pub(crate) order: CheckOrder,
}

impl RankedPolicy {
    fn beats(&self, value: u64, best: Option<u64>) -> bool {
        match (self.direction, best) {
            (_, None) => true,
            (Direction::Min, Some(best)) => value < best,
            (Direction::Max, Some(best)) => value > best,
        }
    }

    fn metric_from_info(
        &self,
        probes: &dyn Probes,
        branch: &Branch,
        fusepath: &str,
        info: &FsInfo,
    ) -> Option<u64> {
        match self.metric {
            Metric::SpaceAvail => Some(info.spaceavail),
            Metric::SpaceUsed => Some(info.spaceused),
            Metric::ModTime => modtime_value(probes, &branch.path, fusepath),
        }
    }
}

fn finish(winner: Option<&Branch>, error: SelectionError) -> Result<PathList, Errno> {
    match winner {
        Some(branch) => Ok(vec![branch.path.clone()]),
        None => Err(error.into_errno()),
    }
}

impl Policy for RankedPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn create(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
        minfreespace: Option<u64>,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();
        let mut error = SelectionError::new();
        let mut best = None;
        let mut winner = None;

        for branch in guard.iter() {
            match self.order {
                CheckOrder::ModeFirst => {
                    if branch.ro_or_nc() {
                        error.record(Errno::EROFS);
                        continue;
                    }
                    if self.existing_path && !probes.exists(&branch.path, fusepath) {
                        error.record(Errno::ENOENT);
                        continue;
                    }
                }
                CheckOrder::ExistsFirst => {
                    if self.existing_path && !probes.exists(&branch.path, fusepath) {
                        error.record(Errno::ENOENT);
                        continue;
                    }
                    if branch.ro_or_nc() {
                        error.record(Errno::EROFS);
                        continue;
                    }
                }
            }
            let info = match probes.info(&branch.path) {
                Ok(info) => info,
                Err(errno) => {
                    error.record(errno);
                    continue;
                }
            };
            if info.readonly {
                error.record(Errno::EROFS);
                continue;
            }
            let reserve = minfreespace.unwrap_or(branch.minfreespace);
            if info.spaceavail < reserve {
                error.record(Errno::ENOSPC);
                continue;
            }
            let Some(value) = self.metric_from_info(probes, branch, fusepath, &info) else {
                error.record(Errno::ENOENT);
                continue;
            };
            if !self.beats(value, best) {
                continue;
            }

            best = Some(value);
            winner = Some(branch);
        }

        finish(winner, error)
    }

    fn action(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();
        let mut error = SelectionError::new();
        let mut best = None;
        let mut winner = None;

        for branch in guard.iter() {
            match self.order {
                CheckOrder::ModeFirst => {
                    if branch.ro() {
                        error.record(Errno::EROFS);
                        continue;
                    }
                    if !probes.exists(&branch.path, fusepath) {
                        error.record(Errno::ENOENT);
                        continue;
                    }
                }
                CheckOrder::ExistsFirst => {
                    if !probes.exists(&branch.path, fusepath) {
                        error.record(Errno::ENOENT);
                        continue;
                    }
                    if branch.ro() {
                        error.record(Errno::EROFS);
                        continue;
                    }
                }
            }
            let info = match probes.info(&branch.path) {
                Ok(info) => info,
                Err(errno) => {
                    error.record(errno);
                    continue;
                }
            };
            if info.readonly {
                error.record(Errno::EROFS);
                continue;
            }
            let Some(value) = self.metric_from_info(probes, branch, fusepath, &info) else {
                error.record(Errno::ENOENT);
                continue;
            };
            if !self.beats(value, best) {
                continue;
            }

            best = Some(value);
            winner = Some(branch);
        }

        finish(winner, error)
    }

    fn search(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();
        let mut best = None;
        let mut winner = None;

        for branch in guard.iter() {
            if !probes.exists(&branch.path, fusepath) {
                continue;
            }
            // Stale space data is tolerable here: the target already
            // exists, so SEARCH reads the cached statvfs layer. A cache
            // miss skips the branch silently.
            let value = match self.metric {
                Metric::SpaceAvail => match probes.spaceavail_cached(&branch.path) {
                    Some(value) => value,
                    None => continue,
                },
                Metric::SpaceUsed => match probes.spaceused_cached(&branch.path) {
                    Some(value) => value,
                    None => continue,
                },
                Metric::ModTime => match modtime_value(probes, &branch.path, fusepath) {
                    Some(value) => value,
                    None => continue,
                },
            };
            if !self.beats(value, best) {
                continue;
            }

            best = Some(value);
            winner = Some(branch);
        }

        finish(winner, SelectionError::new())
    }
}

/// First-found policies: take the first branch that passes the category
/// predicates, no ranking probe at all.
#[derive(Debug)]
pub struct FirstFoundPolicy {
    pub(crate) name: &'static str,
    pub(crate) existing_path: bool,
}

impl Policy for FirstFoundPolicy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn create(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
        minfreespace: Option<u64>,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();
        let mut error = SelectionError::new();

        for branch in guard.iter() {
            if branch.ro_or_nc() {
                error.record(Errno::EROFS);
                continue;
            }
            if self.existing_path && !probes.exists(&branch.path, fusepath) {
                error.record(Errno::ENOENT);
                continue;
            }
            let info = match probes.info(&branch.path) {
                Ok(info) => info,
                Err(errno) => {
                    error.record(errno);
                    continue;
                }
            };
            if info.readonly {
                error.record(Errno::EROFS);
                continue;
            }
            let reserve = minfreespace.unwrap_or(branch.minfreespace);
            if info.spaceavail < reserve {
                error.record(Errno::ENOSPC);
                continue;
            }

            return Ok(vec![branch.path.clone()]);
        }

        Err(error.into_errno())
    }

    fn action(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();
        let mut error = SelectionError::new();

        for branch in guard.iter() {
            if branch.ro() {
                error.record(Errno::EROFS);
                continue;
            }
            if !probes.exists(&branch.path, fusepath) {
                error.record(Errno::ENOENT);
                continue;
            }
            let info = match probes.info(&branch.path) {
                Ok(info) => info,
                Err(errno) => {
                    error.record(errno);
                    continue;
                }
            };
            if info.readonly {
                error.record(Errno::EROFS);
                continue;
            }

            return Ok(vec![branch.path.clone()]);
        }

        Err(error.into_errno())
    }

    fn search(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();

        for branch in guard.iter() {
            if probes.exists(&branch.path, fusepath) {
                return Ok(vec![branch.path.clone()]);
            }
        }

        Err(Errno::ENOENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_policy() -> RankedPolicy {
        RankedPolicy {
            name: "test-min",
            metric: Metric::SpaceUsed,
            direction: Direction::Min,
            existing_path: true,
            order: CheckOrder::ModeFirst,
        }
    }

    fn max_policy() -> RankedPolicy {
        RankedPolicy {
            name: "test-max",
            metric: Metric::SpaceAvail,
            direction: Direction::Max,
            existing_path: true,
            order: CheckOrder::ExistsFirst,
        }
    }

    #[test]
    fn first_candidate_always_beats_nothing() {
        assert!(min_policy().beats(u64::MAX, None));
        assert!(max_policy().beats(0, None));
    }

    #[test]
    fn strict_comparison_rejects_ties() {
        assert!(!min_policy().beats(500, Some(500)));
        assert!(!max_policy().beats(500, Some(500)));
        assert!(min_policy().beats(499, Some(500)));
        assert!(max_policy().beats(501, Some(500)));
    }
}
