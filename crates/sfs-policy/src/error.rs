use sfs_error::Errno;

/// Keeps the most informative errno observed across a branch scan.
///
/// Rejections are accumulated, never short-circuited: the scan visits every
/// branch so a later, less severe rejection cannot mask an earlier severe
/// one. The promotion ladder is
///
/// ```text
/// ENOENT < EACCES < EROFS < ENOSPC
/// ```
///
/// with `ENOENT` as the starting sentinel. If any writable branch existed
/// but lacked space the caller sees `ENOSPC`, not `ENOENT`, which would
/// falsely suggest a missing file. Errnos outside the ladder rank above
/// `ENOENT` but below `EACCES`: they are more actionable than the sentinel
/// yet must not mask a definite permission, read-only or no-space verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionError {
    errno: Errno,
}

fn priority(errno: Errno) -> u8 {
    match errno {
        Errno::ENOENT => 0,
        Errno::EACCES => 2,
        Errno::EROFS => 3,
        Errno::ENOSPC => 4,
        _ => 1,
    }
}

impl SelectionError {
    #[must_use]
    pub fn new() -> Self {
        Self {
            errno: Errno::ENOENT,
        }
    }

    /// Promote to `candidate` if it outranks the current errno.
    pub fn record(&mut self, candidate: Errno) {
        if priority(candidate) > priority(self.errno) {
            self.errno = candidate;
        }
    }

    #[must_use]
    pub fn into_errno(self) -> Errno {
        self.errno
    }
}

impl Default for SelectionError {
    fn default() -> Self {
        Self::new()
    }
}
