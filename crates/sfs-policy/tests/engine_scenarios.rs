//! Seed scenarios and universal invariants for the policy engine, driven
//! through a fixed probe oracle so every selection is deterministic.

use proptest::prelude::*;
use sfs_error::Errno;
use sfs_policy::{POLICIES, PathList, dispatch};
use sfs_probe::{FixedProbes, FsInfo, Probes};
use sfs_types::{Branch, BranchMode, Branches, Category};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

fn rw_info(spaceavail: u64, spaceused: u64) -> FsInfo {
    FsInfo {
        spaceavail,
        spaceused,
        readonly: false,
    }
}

fn branch(path: &str, mode: BranchMode) -> Branch {
    Branch::new(path, mode)
}

fn paths(list: &[&str]) -> PathList {
    list.iter().map(PathBuf::from).collect()
}

// ── Seed scenarios ──────────────────────────────────────────────────────────

#[test]
fn eplus_create_picks_least_used() {
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Rw),
        branch("/c", BranchMode::Rw),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(700, 300))
        .branch("/b", rw_info(900, 100))
        .branch("/c", rw_info(800, 200))
        .file("/a", "/x")
        .file("/b", "/x")
        .file("/c", "/x");

    let selected = dispatch("eplus", Category::Create, &branches, &probes, "/x", None).unwrap();
    assert_eq!(selected, paths(&["/b"]));
}

#[test]
fn eplus_create_respects_branch_reserve() {
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Rw).with_minfreespace(950),
        branch("/c", BranchMode::Rw),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(700, 300))
        .branch("/b", rw_info(900, 100))
        .branch("/c", rw_info(800, 200))
        .file("/a", "/x")
        .file("/b", "/x")
        .file("/c", "/x");

    let selected = dispatch("eplus", Category::Create, &branches, &probes, "/x", None).unwrap();
    assert_eq!(selected, paths(&["/c"]));
}

#[test]
fn epmfs_create_fails_with_erofs_when_nothing_is_writable() {
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Ro),
        branch("/b", BranchMode::Nc),
        branch("/c", BranchMode::Ro),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(100, 100))
        .branch("/b", rw_info(100, 100))
        .branch("/c", rw_info(100, 100))
        .file("/a", "/x")
        .file("/b", "/x")
        .file("/c", "/x");

    let err = dispatch("epmfs", Category::Create, &branches, &probes, "/x", None).unwrap_err();
    assert_eq!(err, Errno::EROFS);
}

#[test]
fn epmfs_action_breaks_ties_by_branch_order() {
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Rw),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(500, 0))
        .branch("/b", rw_info(500, 0))
        .file("/a", "/x")
        .file("/b", "/x");

    let selected = dispatch("epmfs", Category::Action, &branches, &probes, "/x", None).unwrap();
    assert_eq!(selected, paths(&["/a"]));
}

#[test]
fn eplus_search_skips_branches_missing_the_path() {
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Rw),
        branch("/c", BranchMode::Rw),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(0, 100))
        .branch("/b", rw_info(0, 200))
        .branch("/c", rw_info(0, 150))
        .file("/b", "/x")
        .file("/c", "/x");

    let selected = dispatch("eplus", Category::Search, &branches, &probes, "/x", None).unwrap();
    assert_eq!(selected, paths(&["/c"]));
}

#[test]
fn epmfs_create_fails_with_enoent_when_path_absent_everywhere() {
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Rw),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(100, 0))
        .branch("/b", rw_info(100, 0));

    let err = dispatch("epmfs", Category::Create, &branches, &probes, "/x", None).unwrap_err();
    assert_eq!(err, Errno::ENOENT);
}

#[test]
fn rejection_errnos_promote_to_the_most_severe() {
    // Branch 1 lacks the path (ENOENT), branch 2 is read-only (EROFS),
    // branch 3 is below its reserve (ENOSPC). ENOSPC must win.
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Ro),
        branch("/c", BranchMode::Rw).with_minfreespace(1 << 30),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(100, 0))
        .branch("/b", rw_info(100, 0))
        .branch("/c", rw_info(100, 0))
        .file("/b", "/x")
        .file("/c", "/x");

    let err = dispatch("epmfs", Category::Create, &branches, &probes, "/x", None).unwrap_err();
    assert_eq!(err, Errno::ENOSPC);
}

#[test]
fn check_order_is_visible_when_mode_and_existence_both_exclude() {
    // A single candidate that is read-only AND missing the path. Only the
    // first failing predicate is recorded: eplus excludes on mode before
    // probing existence and surfaces EROFS; epmfs probes existence first
    // and surfaces ENOENT.
    let branches = Branches::new(vec![branch("/a", BranchMode::Ro)]);
    let probes = FixedProbes::new().branch("/a", rw_info(100, 0));

    for category in [Category::Create, Category::Action] {
        let err = dispatch("eplus", category, &branches, &probes, "/x", None).unwrap_err();
        assert_eq!(err, Errno::EROFS, "eplus {category}");

        let err = dispatch("epmfs", category, &branches, &probes, "/x", None).unwrap_err();
        assert_eq!(err, Errno::ENOENT, "epmfs {category}");
    }
}

// ── Universal invariants ────────────────────────────────────────────────────

fn rich_fixture() -> (Branches, FixedProbes) {
    let branches = Branches::new(vec![
        branch("/ro", BranchMode::Ro),
        branch("/nc", BranchMode::Nc),
        branch("/full", BranchMode::Rw).with_minfreespace(1 << 40),
        branch("/mounted-ro", BranchMode::Rw),
        branch("/small", BranchMode::Rw),
        branch("/big", BranchMode::Rw),
        branch("/broken", BranchMode::Rw),
    ]);
    let mut probes = FixedProbes::new()
        .branch("/ro", rw_info(500, 500))
        .branch("/nc", rw_info(500, 500))
        .branch("/full", rw_info(100, 900))
        .branch(
            "/mounted-ro",
            FsInfo {
                spaceavail: 900,
                spaceused: 100,
                readonly: true,
            },
        )
        .branch("/small", rw_info(200, 800))
        .branch("/big", rw_info(800, 200))
        .branch_err("/broken", Errno::EACCES);
    for path in ["/ro", "/nc", "/full", "/mounted-ro", "/small", "/big", "/broken"] {
        probes = probes.file(path, "/x");
    }
    (branches, probes)
}

#[test]
fn selections_are_deterministic_under_fixed_probes() {
    let (branches, probes) = rich_fixture();
    for policy in POLICIES {
        // rand/eprand are deliberately nondeterministic.
        if policy.name().contains("rand") {
            continue;
        }
        for category in [Category::Create, Category::Action, Category::Search] {
            let first = dispatch(policy.name(), category, &branches, &probes, "/x", None);
            for _ in 0..3 {
                let again = dispatch(policy.name(), category, &branches, &probes, "/x", None);
                assert_eq!(first, again, "{} {category}", policy.name());
            }
        }
    }
}

#[test]
fn successes_are_nonempty_and_members_of_the_branch_set() {
    let (branches, probes) = rich_fixture();
    let known: Vec<PathBuf> = branches.snapshot().into_iter().map(|b| b.path).collect();

    for policy in POLICIES {
        for category in [Category::Create, Category::Action, Category::Search] {
            if let Ok(selected) =
                dispatch(policy.name(), category, &branches, &probes, "/x", None)
            {
                assert!(!selected.is_empty(), "{} {category}", policy.name());
                for path in &selected {
                    assert!(known.contains(path), "{} {category}", policy.name());
                }
            }
        }
    }
}

#[test]
fn create_never_selects_excluded_branches() {
    let (branches, probes) = rich_fixture();
    let excluded = [
        PathBuf::from("/ro"),
        PathBuf::from("/nc"),
        PathBuf::from("/full"),
        PathBuf::from("/mounted-ro"),
        PathBuf::from("/broken"),
    ];

    for policy in POLICIES {
        if let Ok(selected) =
            dispatch(policy.name(), Category::Create, &branches, &probes, "/x", None)
        {
            for path in &selected {
                assert!(!excluded.contains(path), "{}: {}", policy.name(), path.display());
            }
        }
    }
}

#[test]
fn action_never_selects_readonly_branches() {
    let (branches, probes) = rich_fixture();
    let excluded = [
        PathBuf::from("/ro"),
        PathBuf::from("/mounted-ro"),
        PathBuf::from("/broken"),
    ];

    for policy in POLICIES {
        if let Ok(selected) =
            dispatch(policy.name(), Category::Action, &branches, &probes, "/x", None)
        {
            for path in &selected {
                assert!(!excluded.contains(path), "{}: {}", policy.name(), path.display());
            }
        }
    }
}

#[test]
fn search_ignores_modes_and_space() {
    let (branches, probes) = rich_fixture();

    // epall search returns every branch holding the path, including the
    // read-only and over-reserve ones. /broken fails only its info probe,
    // and search never calls info.
    let selected = dispatch("epall", Category::Search, &branches, &probes, "/x", None).unwrap();
    assert_eq!(
        selected,
        paths(&["/ro", "/nc", "/full", "/mounted-ro", "/small", "/big", "/broken"])
    );
}

#[test]
fn reconfiguration_is_observed_by_the_next_call() {
    let probes = FixedProbes::new()
        .branch("/a", rw_info(100, 0))
        .branch("/b", rw_info(900, 0))
        .file("/a", "/x")
        .file("/b", "/x");

    let branches = Branches::new(vec![branch("/a", BranchMode::Rw)]);
    let selected = dispatch("epmfs", Category::Create, &branches, &probes, "/x", None).unwrap();
    assert_eq!(selected, paths(&["/a"]));

    branches.replace(vec![branch("/b", BranchMode::Rw)]);
    let selected = dispatch("epmfs", Category::Create, &branches, &probes, "/x", None).unwrap();
    assert_eq!(selected, paths(&["/b"]));
}

#[test]
fn rand_policies_select_from_the_qualifying_set() {
    let (branches, probes) = rich_fixture();
    let qualifying = [PathBuf::from("/small"), PathBuf::from("/big")];

    for _ in 0..32 {
        let selected =
            dispatch("eprand", Category::Create, &branches, &probes, "/x", None).unwrap();
        assert_eq!(selected.len(), 1);
        assert!(qualifying.contains(&selected[0]));
    }
}

#[test]
fn newest_picks_the_most_recent_copy() {
    let base = SystemTime::UNIX_EPOCH;
    let at = |secs| base + std::time::Duration::from_secs(secs);

    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Rw),
        branch("/c", BranchMode::Rw),
    ]);
    let probes = FixedProbes::new()
        .branch("/a", rw_info(100, 0))
        .branch("/b", rw_info(100, 0))
        .branch("/c", rw_info(100, 0))
        .file_with_modtime("/a", "/x", at(100))
        .file_with_modtime("/b", "/x", at(300))
        .file_with_modtime("/c", "/x", at(200));

    for category in [Category::Create, Category::Action, Category::Search] {
        let selected = dispatch("newest", category, &branches, &probes, "/x", None).unwrap();
        assert_eq!(selected, paths(&["/b"]), "{category}");
    }
}

// ── Probe-source separation ─────────────────────────────────────────────────

struct CountingProbes {
    inner: FixedProbes,
    info_calls: AtomicUsize,
    cached_calls: AtomicUsize,
}

impl CountingProbes {
    fn new(inner: FixedProbes) -> Self {
        Self {
            inner,
            info_calls: AtomicUsize::new(0),
            cached_calls: AtomicUsize::new(0),
        }
    }
}

impl Probes for CountingProbes {
    fn exists(&self, branch: &Path, fusepath: &str) -> bool {
        self.inner.exists(branch, fusepath)
    }

    fn info(&self, branch: &Path) -> Result<FsInfo, Errno> {
        self.info_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.info(branch)
    }

    fn spaceavail_cached(&self, branch: &Path) -> Option<u64> {
        self.cached_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.spaceavail_cached(branch)
    }

    fn spaceused_cached(&self, branch: &Path) -> Option<u64> {
        self.cached_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.spaceused_cached(branch)
    }

    fn modtime(&self, branch: &Path, fusepath: &str) -> Option<SystemTime> {
        self.inner.modtime(branch, fusepath)
    }
}

#[test]
fn search_uses_only_cached_probes_and_create_action_only_info() {
    let branches = Branches::new(vec![
        branch("/a", BranchMode::Rw),
        branch("/b", BranchMode::Rw),
    ]);
    let fixture = FixedProbes::new()
        .branch("/a", rw_info(100, 100))
        .branch("/b", rw_info(200, 200))
        .file("/a", "/x")
        .file("/b", "/x");

    for policy in POLICIES {
        let probes = CountingProbes::new(fixture.clone());
        let _ = dispatch(policy.name(), Category::Search, &branches, &probes, "/x", None);
        assert_eq!(
            probes.info_calls.load(Ordering::Relaxed),
            0,
            "{} search must not probe authoritative info",
            policy.name()
        );

        let probes = CountingProbes::new(fixture.clone());
        let _ = dispatch(policy.name(), Category::Create, &branches, &probes, "/x", None);
        let _ = dispatch(policy.name(), Category::Action, &branches, &probes, "/x", None);
        assert_eq!(
            probes.cached_calls.load(Ordering::Relaxed),
            0,
            "{} create/action must not read the statvfs cache",
            policy.name()
        );
    }
}

// ── Property tests ──────────────────────────────────────────────────────────

proptest! {
    // Equal metrics across any number of qualifying branches: the first
    // qualifying branch always wins.
    #[test]
    fn tie_break_prefers_the_earliest_branch(
        count in 1usize..12,
        avail in 0u64..1_000_000,
        skip_first in proptest::bool::ANY,
    ) {
        let mut vec = Vec::new();
        let mut probes = FixedProbes::new();
        for i in 0..count {
            let path = format!("/b{i}");
            let mode = if skip_first && i == 0 { BranchMode::Ro } else { BranchMode::Rw };
            vec.push(branch(&path, mode));
            probes = probes
                .branch(path.clone(), rw_info(avail, avail))
                .file(path, "/x");
        }
        let branches = Branches::new(vec);

        let expected = if skip_first && count == 1 {
            None
        } else {
            Some(PathBuf::from(if skip_first { "/b1" } else { "/b0" }))
        };

        for policy in ["epmfs", "eplus", "eplfs", "lus", "mfs", "lfs", "epff", "ff"] {
            let result = dispatch(policy, Category::Create, &branches, &probes, "/x", None);
            match &expected {
                Some(path) => prop_assert_eq!(result.unwrap(), vec![path.clone()]),
                None => prop_assert_eq!(result.unwrap_err(), Errno::EROFS),
            }
        }
    }
}
