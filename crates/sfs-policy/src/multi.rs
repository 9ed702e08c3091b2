//! Multi-select and stochastic policies.
//!
//! `all`/`epall` return every qualifying branch in branch order; ACTION
//! dispatch fans an operation out across the whole list. `rand`/`eprand`
//! evaluate the same qualifying set and then keep one member uniformly at
//! random.

use crate::error::SelectionError;
use crate::{PathList, Policy};
use rand::Rng;
use sfs_error::Errno;
use sfs_probe::Probes;
use sfs_types::Branches;

#[derive(Debug)]
pub struct AllPolicy {
    pub(crate) name: &'static str,
    pub(crate) existing_path: bool,
}

impl Policy for AllPolicy {
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
        let mut paths = Vec::new();

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

            paths.push(branch.path.clone());
        }

        if paths.is_empty() {
            return Err(error.into_errno());
        }
        Ok(paths)
    }

    fn action(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();
        let mut error = SelectionError::new();
        let mut paths = Vec::new();

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

            paths.push(branch.path.clone());
        }

        if paths.is_empty() {
            return Err(error.into_errno());
        }
        Ok(paths)
    }

    fn search(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        let guard = branches.read();
        let paths: PathList = guard
            .iter()
            .filter(|branch| probes.exists(&branch.path, fusepath))
            .map(|branch| branch.path.clone())
            .collect();

        if paths.is_empty() {
            return Err(Errno::ENOENT);
        }
        Ok(paths)
    }
}

/// Evaluate as the wrapped `all`-family policy, then keep one qualifying
/// branch uniformly at random.
#[derive(Debug)]
pub struct RandPolicy {
    pub(crate) name: &'static str,
    pub(crate) inner: &'static AllPolicy,
}

fn pick_one(mut paths: PathList) -> PathList {
    if paths.len() > 1 {
        let index = rand::rng().random_range(0..paths.len());
        paths.swap(0, index);
        paths.truncate(1);
    }
    paths
}

impl Policy for RandPolicy {
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
        self.inner
            .create(branches, probes, fusepath, minfreespace)
            .map(pick_one)
    }

    fn action(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        self.inner.action(branches, probes, fusepath).map(pick_one)
    }

    fn search(
        &self,
        branches: &Branches,
        probes: &dyn Probes,
        fusepath: &str,
    ) -> Result<PathList, Errno> {
        self.inner.search(branches, probes, fusepath).map(pick_one)
    }
}
