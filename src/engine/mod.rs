// src/engine/mod.rs

//! The package engine boundary
//!
//! Everything the orchestration layer needs from a package engine is
//! expressed here as a trait plus the data shapes that cross it:
//! repository records, package snapshots, filtered queries, spec
//! resolution, goal resolution, signature checks, download, and commit.
//! `LocalEngine` is the concrete session backed by the state database and
//! HTTP repository metadata.

use crate::error::Result;
use crate::version::Evr;
use serde::Serialize;

pub mod goal;
pub mod local;
pub mod transaction;

pub use goal::{Goal, GoalJob, GoalJobSettings};
pub use local::LocalEngine;
pub use transaction::{Action, Resolution, RunCode, RunResult, Transaction, TransactionPackage};

/// Repository identifier used for packages supplied directly on the
/// command line rather than fetched from a repository.
pub const COMMANDLINE_REPO: &str = "@commandline";

/// Immutable package snapshot returned by queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub arch: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    /// Identifier of the originating repository
    pub repo: String,
}

impl Package {
    /// Fully qualified name-epoch:version-release.arch identity
    pub fn nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name, self.epoch, self.version, self.release, self.arch
        )
    }

    /// The epoch:version-release triple for ordering
    pub fn evr(&self) -> Evr {
        Evr::new(self.epoch, &self.version, &self.release)
    }
}

/// Repository record exposed to the caller
#[derive(Debug, Clone, Serialize)]
pub struct RepoRecord {
    pub repoid: String,
    pub enabled: bool,
    pub url: String,
    pub last_sync: Option<String>,
}

/// Predefined filters over the package index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFilter {
    Installed,
    Upgrades,
    Available,
    Unneeded,
}

impl PackageFilter {
    /// Map a listing keyword to its filter
    ///
    /// Anything unrecognized returns None; callers fall back to spec
    /// resolution, which is the defined default for unknown keywords.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "installed" => Some(PackageFilter::Installed),
            "upgrades" => Some(PackageFilter::Upgrades),
            "available" => Some(PackageFilter::Available),
            _ => None,
        }
    }
}

/// Settings controlling how a free-form spec is matched
#[derive(Debug, Clone)]
pub struct ResolveSpecSettings {
    /// Match against the installed set
    pub match_installed: bool,
    /// Match against the available set
    pub match_available: bool,
    /// Try NEVRA-qualified forms in addition to plain names and globs
    pub with_nevra: bool,
}

impl Default for ResolveSpecSettings {
    fn default() -> Self {
        Self {
            match_installed: true,
            match_available: true,
            with_nevra: true,
        }
    }
}

/// Outcome of a per-package signature check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    Ok,
    /// Check not performed (disabled, or package has no repository metadata
    /// to check against)
    Skipped(String),
    Failed(String),
}

/// Progress events for repository loading and package downloads
///
/// Implementations are owned by the caller in a binding whose lifetime
/// brackets the operation using them; the engine only borrows.
pub trait LoadCallbacks {
    fn repo_loaded(&mut self, _repo_id: &str, _package_count: usize) {}
    fn repo_failed(&mut self, _repo_id: &str, _error: &str) {}
    fn download_start(&mut self, _nevra: &str) {}
    fn download_done(&mut self, _nevra: &str) {}
}

/// No-op callbacks for callers that do not care about progress
#[derive(Debug, Default)]
pub struct NopCallbacks;

impl LoadCallbacks for NopCallbacks {}

/// The call contract consumed by the orchestration layer
///
/// One engine session per invocation; the session owns the loaded
/// repository and package index for its entire lifetime.
pub trait Engine {
    /// Repository records known to the session
    fn repositories(&self) -> Result<Vec<RepoRecord>>;

    /// Enable or disable repositories whose identifier matches a glob.
    /// Returns how many repositories changed state.
    fn set_repos_enabled(&mut self, id_glob: &str, enabled: bool) -> Result<usize>;

    /// Load and refresh metadata for enabled repositories.
    ///
    /// Failure is fatal to the invocation; the caller makes a single
    /// attempt.
    fn refresh(&mut self, callbacks: &mut dyn LoadCallbacks) -> Result<()>;

    /// Run a predefined filter over the package index
    fn query(&self, filter: PackageFilter) -> Result<Vec<Package>>;

    /// Best-effort match of a free-form spec to zero or more packages
    fn resolve_spec(&self, spec: &str, settings: &ResolveSpecSettings) -> Result<Vec<Package>>;

    /// Resolve an accumulated goal into package actions and problems
    fn resolve_goal(&self, goal: &Goal) -> Result<Resolution>;

    /// Verify a package's signature/digest against repository metadata
    fn check_signature(&self, package: &Package) -> Result<SignatureCheck>;

    /// Download artifacts for inbound packages not already cached
    fn download(
        &self,
        packages: &[TransactionPackage],
        callbacks: &mut dyn LoadCallbacks,
    ) -> Result<()>;

    /// Apply package actions, annotated with a caller description.
    ///
    /// Transaction-level failures are reported in the returned result, not
    /// as an Err; Err is reserved for environmental failures.
    fn commit(&mut self, packages: &[TransactionPackage], description: &str) -> Result<RunResult>;
}
