use crate::FsInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct CacheEntry {
    info: FsInfo,
    refreshed: Instant,
}

/// TTL-bounded statvfs results, shared by every SEARCH-category probe.
///
/// **Locking strategy:** a single `parking_lot::Mutex` protects the map.
/// The statvfs syscall itself runs outside the lock so one slow mount
/// cannot stall probes against other branches; the worst case is a few
/// redundant refreshes racing for the same entry.
///
/// A zero TTL disables caching: every lookup issues a fresh statvfs and
/// nothing is stored.
#[derive(Debug)]
pub struct StatvfsCache {
    ttl: Duration,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl StatvfsCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch the cached info for `path`, refreshing if the entry is older
    /// than the TTL. Probe failure answers `None` and leaves any stale
    /// entry in place for the next attempt.
    pub fn lookup(&self, path: &Path) -> Option<FsInfo> {
        if self.ttl.is_zero() {
            return crate::read_statvfs(path).ok();
        }

        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(path) {
                if entry.refreshed.elapsed() < self.ttl {
                    return Some(entry.info);
                }
            }
        }

        match crate::read_statvfs(path) {
            Ok(info) => {
                self.entries.lock().insert(
                    path.to_path_buf(),
                    CacheEntry {
                        info,
                        refreshed: Instant::now(),
                    },
                );
                Some(info)
            }
            Err(errno) => {
                debug!(path = %path.display(), %errno, "statvfs refresh failed");
                None
            }
        }
    }

    /// Drop the entry for one branch (e.g. after it was unmounted).
    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
