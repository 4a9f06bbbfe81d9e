//! Per-item engine selection
//!
//! Selection is a pure function of the requested engine, the source location
//! and the optional mirror. Repository locations always go to `git`, whatever
//! the caller asked for.

use crate::types::EngineName;

/// Code-hosting origins whose `/<owner>/<repo>` URLs are cloned with git
const GIT_HOSTS: &[&str] = &[
    "https://github.com",
    "http://github.com",
    "https://gitlab.com",
    "http://gitlab.com",
    "https://bitbucket.org",
    "http://bitbucket.org",
];

/// `scheme://host/owner/repo` has exactly four slashes
const REPOSITORY_SLASHES: usize = 4;

/// Engine and location chosen for one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Engine that will run the retrieval
    pub engine: EngineName,
    /// Location handed to the engine (mirror-rewritten when a mirror is set)
    pub location: String,
}

/// Whether a location unambiguously names a git repository
///
/// # Examples
///
/// ```
/// use scifetch::engine::is_repository;
///
/// assert!(is_repository("git@github.com:org/repo.git"));
/// assert!(is_repository("https://github.com/org/repo"));
/// assert!(!is_repository("https://github.com/org/repo/archive/v1.0.tar.gz"));
/// ```
#[must_use]
pub fn is_repository(location: &str) -> bool {
    if location.starts_with("git@") {
        return true;
    }
    GIT_HOSTS.iter().any(|host| location.contains(host))
        && location.matches('/').count() == REPOSITORY_SLASHES
}

/// Replace the path of `location` with `mirror`, keeping the final segment
///
/// ```
/// use scifetch::engine::apply_mirror;
///
/// assert_eq!(
///     apply_mirror("https://ftp.ncbi.nlm.nih.gov/genomes/hg38.fa.gz", "https://mirror.example/hg"),
///     "https://mirror.example/hg/hg38.fa.gz"
/// );
/// ```
#[must_use]
pub fn apply_mirror(location: &str, mirror: &str) -> String {
    let basename = location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(location);
    if mirror.ends_with('/') {
        format!("{mirror}{basename}")
    } else {
        format!("{mirror}/{basename}")
    }
}

/// Choose the engine and effective location for one item
#[must_use]
pub fn select(requested: EngineName, location: &str, mirror: Option<&str>) -> Selection {
    let effective = match mirror.filter(|m| !m.is_empty()) {
        Some(mirror) => apply_mirror(location, mirror),
        None => location.to_string(),
    };

    let engine = if is_repository(location) {
        EngineName::Git
    } else {
        requested
    };

    Selection {
        engine,
        location: effective,
    }
}
