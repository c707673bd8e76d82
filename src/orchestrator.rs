// src/orchestrator.rs

//! High-level package operations
//!
//! `PackageOrchestrator` wraps an engine session and exposes the two
//! invocation-level operations: listing package sets and driving the
//! system toward a desired package state. It owns the invocation shape:
//! one refresh on construction, one goal resolved once, one transaction
//! executed once.
//!
//! Resolution problems and signature failures are surfaced in the
//! report, never used to abort the run.

use crate::engine::{
    Action, Engine, Goal, GoalJobSettings, LoadCallbacks, Package, PackageFilter, RepoRecord,
    ResolveSpecSettings, RunResult, SignatureCheck,
};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Description attached to every transaction this tool applies
pub const TRANSACTION_DESCRIPTION: &str = "quartermaster";

/// Desired package state for an ensure invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureAction {
    /// Package should be installed (any version)
    Present,
    /// Package should be installed at the newest available version
    Latest,
    /// Package should not be installed
    Absent,
    /// Remove dependency-installed packages nothing requires anymore
    Autoremove,
    /// Unrecognized action keyword; resolves to an empty transaction
    Unknown,
}

impl EnsureAction {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "present" | "installed" => EnsureAction::Present,
            "latest" => EnsureAction::Latest,
            "absent" | "removed" => EnsureAction::Absent,
            "autoremove" => EnsureAction::Autoremove,
            _ => EnsureAction::Unknown,
        }
    }
}

/// One line of `list` output
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ListEntry {
    Package(Package),
    Repo { repoid: String, state: String },
}

/// Everything an ensure invocation observed and produced
#[derive(Debug)]
pub struct EnsureReport {
    /// Problems reported while resolving the goal
    pub problems: Vec<String>,
    /// Per-package signature failure messages, pre-rendered
    pub signature_failures: Vec<String>,
    /// The resolved actions, as (nevra, action) pairs
    pub actions: Vec<(String, Action)>,
    /// Execution result; every transaction is executed, empty ones as a
    /// successful no-op
    pub result: RunResult,
}

impl EnsureReport {
    pub fn changed(&self) -> bool {
        self.result.is_success() && !self.actions.is_empty()
    }
}

impl fmt::Display for EnsureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Signature diagnostics come first, straight after resolution
        for failure in &self.signature_failures {
            writeln!(f, "{}", failure)?;
        }

        if self.problems.is_empty() {
            writeln!(f, "Transaction resolved correctly.")?;
        } else {
            writeln!(
                f,
                "Following issues happened when resolving the transaction:"
            )?;
            for problem in &self.problems {
                writeln!(f, "{}", problem)?;
            }
        }

        if self.actions.is_empty() {
            writeln!(f, "Transaction is empty.")?;
        } else {
            writeln!(f, "Transaction summary:")?;
            for (nevra, action) in &self.actions {
                writeln!(f, " {}: {}", action.as_str(), nevra)?;
            }
        }

        if self.result.is_success() {
            writeln!(f, "Transaction completed successfully.")?;
        } else {
            writeln!(f, "Transaction was not successful: {}", self.result.message)?;
            if !self.result.problems.is_empty() {
                writeln!(
                    f,
                    "Following issues happened when executing the transaction:"
                )?;
                for problem in &self.result.problems {
                    writeln!(f, "{}", problem)?;
                }
            }
        }

        Ok(())
    }
}

/// Logs progress events as they arrive
#[derive(Debug, Default)]
struct LoggingCallbacks;

impl LoadCallbacks for LoggingCallbacks {
    fn repo_loaded(&mut self, repo_id: &str, package_count: usize) {
        info!("Repository {} loaded, {} packages", repo_id, package_count);
    }

    fn repo_failed(&mut self, repo_id: &str, error: &str) {
        warn!("Repository {} failed to load: {}", repo_id, error);
    }

    fn download_start(&mut self, nevra: &str) {
        debug!("Downloading {}", nevra);
    }

    fn download_done(&mut self, nevra: &str) {
        debug!("Downloaded {}", nevra);
    }
}

/// The invocation-level façade over an engine session
pub struct PackageOrchestrator<E: Engine> {
    engine: E,
    repos: Vec<RepoRecord>,
}

impl<E: Engine> PackageOrchestrator<E> {
    /// Build an orchestrator, refreshing repository metadata once.
    ///
    /// A refresh failure is fatal; no retry happens at this level.
    pub fn new(mut engine: E) -> Result<Self> {
        let mut callbacks = LoggingCallbacks;
        engine.refresh(&mut callbacks)?;
        let repos = engine.repositories()?;
        Ok(Self { engine, repos })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// List packages or repositories.
    ///
    /// The first argument selects the listing: a known keyword picks a
    /// predefined set, "repos" and "repositories" list the enabled
    /// repositories, and anything else makes every argument a package
    /// spec. Spec results are concatenated in argument order,
    /// unduplicated.
    pub fn list(&self, args: &[String]) -> Result<Vec<ListEntry>> {
        let mut entries = Vec::new();

        let Some(first) = args.first() else {
            return Ok(entries);
        };

        if first == "repos" || first == "repositories" {
            for repo in self.repos.iter().filter(|r| r.enabled) {
                entries.push(ListEntry::Repo {
                    repoid: repo.repoid.clone(),
                    state: "enabled".to_string(),
                });
            }
            return Ok(entries);
        }

        if let Some(filter) = PackageFilter::from_keyword(first) {
            for pkg in self.engine.query(filter)? {
                entries.push(ListEntry::Package(pkg));
            }
            return Ok(entries);
        }

        debug!("Listing arguments treated as package specs");
        let settings = ResolveSpecSettings::default();
        for spec in args {
            for pkg in self.engine.resolve_spec(spec, &settings)? {
                entries.push(ListEntry::Package(pkg));
            }
        }

        Ok(entries)
    }

    /// Drive the system toward the desired state for the given specs
    pub fn ensure(&mut self, action: EnsureAction, specs: &[String]) -> Result<EnsureReport> {
        let goal = self.build_goal(action, specs)?;

        let transaction = goal.resolve(&self.engine)?;
        let problems = transaction.problems().to_vec();
        let actions: Vec<(String, Action)> = transaction
            .packages()
            .iter()
            .map(|tp| (tp.package.nevra(), tp.action))
            .collect();

        // Signatures are checked straight after resolution, before any
        // artifact moves
        let signature_failures = self.check_signatures(transaction.packages())?;

        let mut callbacks = LoggingCallbacks;
        transaction.download(&self.engine, &mut callbacks)?;

        // Executed even when empty; the engine applies it as a no-op
        let result = transaction.run(&mut self.engine, TRANSACTION_DESCRIPTION)?;

        Ok(EnsureReport {
            problems,
            signature_failures,
            actions,
            result,
        })
    }

    fn build_goal(&self, action: EnsureAction, specs: &[String]) -> Result<Goal> {
        let mut goal = Goal::new();

        match action {
            EnsureAction::Present => {
                for spec in specs {
                    goal.add_install(spec, GoalJobSettings::default());
                }
            }
            EnsureAction::Latest => {
                // A lone "*" means the whole installed set
                if specs.first().map(String::as_str) == Some("*") {
                    goal.add_upgrade_all(GoalJobSettings::default());
                } else {
                    for spec in specs {
                        goal.add_upgrade(spec, GoalJobSettings::default());
                    }
                }
            }
            EnsureAction::Absent => {
                for spec in specs {
                    goal.add_remove(spec, GoalJobSettings::default());
                }
            }
            EnsureAction::Autoremove => {
                for pkg in self.engine.query(PackageFilter::Unneeded)? {
                    goal.add_package_remove(pkg, GoalJobSettings::default());
                }
            }
            EnsureAction::Unknown => {
                debug!("Unrecognized action keyword, goal left empty");
            }
        }

        Ok(goal)
    }

    /// Check signatures of inbound packages, collecting failure messages.
    /// Failures never block the transaction.
    fn check_signatures(
        &self,
        packages: &[crate::engine::TransactionPackage],
    ) -> Result<Vec<String>> {
        let mut failures = Vec::new();
        for tp in packages {
            if !tp.action.is_inbound() {
                continue;
            }
            if let SignatureCheck::Failed(reason) = self.engine.check_signature(&tp.package)? {
                failures.push(format!(
                    "Failed to validate package signature for \"{}\" with error \"{}\".",
                    tp.package.nevra(),
                    reason
                ));
            }
        }
        Ok(failures)
    }
}
