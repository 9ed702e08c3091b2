#![forbid(unsafe_code)]

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// How a branch participates in the union.
///
/// `Nc` ("no create") branches accept modifications to objects they already
/// hold but are never chosen to host new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BranchMode {
    Rw,
    Ro,
    Nc,
}

impl BranchMode {
    /// The configuration token for this mode. Round-trips with [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rw => "RW",
            Self::Ro => "RO",
            Self::Nc => "NC",
        }
    }
}

impl fmt::Display for BranchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BranchMode {
    type Err = BranchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RW" => Ok(Self::Rw),
            "RO" => Ok(Self::Ro),
            "NC" => Ok(Self::Nc),
            other => Err(BranchParseError::UnknownMode(other.to_owned())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BranchParseError {
    #[error("empty branch path")]
    EmptyPath,
    #[error("unknown branch mode {0:?} (expected RW, RO or NC)")]
    UnknownMode(String),
    #[error("invalid size {0:?}")]
    InvalidSize(String),
    #[error("size overflows u64: {0:?}")]
    SizeOverflow(String),
}

/// One underlying directory tree of the union.
///
/// Branches are immutable per configuration epoch: they are constructed at
/// load or reconfigure time and replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub path: PathBuf,
    pub mode: BranchMode,
    /// Soft reserve in bytes below which this branch refuses new objects.
    #[serde(default)]
    pub minfreespace: u64,
}

impl Branch {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, mode: BranchMode) -> Self {
        Self {
            path: path.into(),
            mode,
            minfreespace: 0,
        }
    }

    #[must_use]
    pub fn with_minfreespace(mut self, minfreespace: u64) -> Self {
        self.minfreespace = minfreespace;
        self
    }

    #[must_use]
    pub fn ro(&self) -> bool {
        self.mode == BranchMode::Ro
    }

    #[must_use]
    pub fn ro_or_nc(&self) -> bool {
        matches!(self.mode, BranchMode::Ro | BranchMode::Nc)
    }

    /// Parse a single `PATH[=MODE[,MINFREESPACE]]` token.
    ///
    /// A bare path defaults to `RW` with `default_minfreespace`. The size
    /// accepts binary suffixes (`K`, `M`, `G`, `T`).
    pub fn parse_token(token: &str, default_minfreespace: u64) -> Result<Self, BranchParseError> {
        let (path, opts) = match token.split_once('=') {
            Some((path, opts)) => (path, Some(opts)),
            None => (token, None),
        };
        if path.is_empty() {
            return Err(BranchParseError::EmptyPath);
        }

        let mut mode = BranchMode::Rw;
        let mut minfreespace = default_minfreespace;
        if let Some(opts) = opts {
            let (mode_str, size) = match opts.split_once(',') {
                Some((mode_str, size)) => (mode_str, Some(size)),
                None => (opts, None),
            };
            mode = mode_str.parse()?;
            if let Some(size) = size {
                minfreespace = parse_size(size)?;
            }
        }

        Ok(Self {
            path: PathBuf::from(path),
            mode,
            minfreespace,
        })
    }
}

/// Parse a byte count with an optional binary suffix (`K`, `M`, `G`, `T`).
pub fn parse_size(s: &str) -> Result<u64, BranchParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(BranchParseError::InvalidSize(s.to_owned()));
    }

    let (digits, shift) = match s.as_bytes()[s.len() - 1].to_ascii_uppercase() {
        b'K' => (&s[..s.len() - 1], 10),
        b'M' => (&s[..s.len() - 1], 20),
        b'G' => (&s[..s.len() - 1], 30),
        b'T' => (&s[..s.len() - 1], 40),
        _ => (s, 0),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| BranchParseError::InvalidSize(s.to_owned()))?;
    value
        .checked_shl(shift)
        .filter(|v| v >> shift == value)
        .ok_or_else(|| BranchParseError::SizeOverflow(s.to_owned()))
}

/// The ordered branch set.
///
/// Insertion order is user-supplied and is the canonical tie-break order for
/// every policy. Policy scans hold the read lock for their whole pass;
/// reconfiguration takes the write lock and swaps the vector wholesale, so a
/// live read guard always observes a stable set.
#[derive(Debug, Default)]
pub struct Branches {
    vec: RwLock<Vec<Branch>>,
}

impl Branches {
    #[must_use]
    pub fn new(branches: Vec<Branch>) -> Self {
        Self {
            vec: RwLock::new(branches),
        }
    }

    /// Parse a colon-separated `PATH[=MODE[,MINFREESPACE]]` list.
    pub fn parse_list(
        list: &str,
        default_minfreespace: u64,
    ) -> Result<Self, BranchParseError> {
        let branches = list
            .split(':')
            .filter(|token| !token.is_empty())
            .map(|token| Branch::parse_token(token, default_minfreespace))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(branches))
    }

    /// Scoped read access for a policy scan. The guard must be dropped before
    /// any reconfiguration can proceed.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Branch>> {
        self.vec.read()
    }

    /// Replace the whole set. Excludes all readers for the duration of the
    /// swap.
    pub fn replace(&self, branches: Vec<Branch>) {
        *self.vec.write() = branches;
    }

    /// Clone the current set out from under the read lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Branch> {
        self.vec.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vec.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vec.read().is_empty()
    }
}

impl Clone for Branches {
    fn clone(&self) -> Self {
        Self::new(self.snapshot())
    }
}

impl PartialEq for Branches {
    fn eq(&self, other: &Self) -> bool {
        *self.vec.read() == *other.vec.read()
    }
}

impl Eq for Branches {}

impl From<Vec<Branch>> for Branches {
    fn from(branches: Vec<Branch>) -> Self {
        Self::new(branches)
    }
}

impl Serialize for Branches {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.vec.read().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Branches {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Branch>::deserialize(deserializer).map(Self::new)
    }
}

/// The abstract class of operation being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Select a branch that will host a new object.
    Create,
    /// Select branches where an existing object will be modified.
    Action,
    /// Select branches where an existing object will be read.
    Search,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Action => "action",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = BranchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "action" => Ok(Self::Action),
            "search" => Ok(Self::Search),
            other => Err(BranchParseError::UnknownMode(other.to_owned())),
        }
    }
}
