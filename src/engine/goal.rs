// src/engine/goal.rs

//! Goal accumulation
//!
//! A goal collects high-level package intents for one invocation and is
//! consumed exactly once by resolution. Consuming `self` in `resolve`
//! makes the resolve-at-most-once invariant a compile-time property.

use super::{Engine, Package, Transaction};
use crate::error::Result;

/// Per-job resolution settings
///
/// Carried with each intent; the engine may use them to narrow candidate
/// selection (advisory filtering) or widen matching (group names).
#[derive(Debug, Clone, Default)]
pub struct GoalJobSettings {
    /// Restrict upgrade candidates to those attached to a named advisory
    /// type (e.g. "security", "bugfix")
    pub advisory_filter: Option<String>,
    /// Also match package groups by their human-readable name
    pub group_with_name: bool,
}

/// A single package intent
#[derive(Debug, Clone)]
pub enum GoalJob {
    /// Install the best candidate matching a spec
    Install {
        spec: String,
        settings: GoalJobSettings,
    },
    /// Upgrade installed packages matching a spec
    Upgrade {
        spec: String,
        settings: GoalJobSettings,
    },
    /// Upgrade every installed package with a newer candidate
    UpgradeAll { settings: GoalJobSettings },
    /// Remove installed packages matching a spec
    Remove {
        spec: String,
        settings: GoalJobSettings,
    },
    /// Remove one concrete package (autoremove path)
    RemovePackage {
        package: Package,
        settings: GoalJobSettings,
    },
}

/// An accumulation of intents, resolved at most once
#[derive(Debug, Default)]
pub struct Goal {
    jobs: Vec<GoalJob>,
}

impl Goal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_install(&mut self, spec: &str, settings: GoalJobSettings) {
        self.jobs.push(GoalJob::Install {
            spec: spec.to_string(),
            settings,
        });
    }

    pub fn add_upgrade(&mut self, spec: &str, settings: GoalJobSettings) {
        self.jobs.push(GoalJob::Upgrade {
            spec: spec.to_string(),
            settings,
        });
    }

    pub fn add_upgrade_all(&mut self, settings: GoalJobSettings) {
        self.jobs.push(GoalJob::UpgradeAll { settings });
    }

    pub fn add_remove(&mut self, spec: &str, settings: GoalJobSettings) {
        self.jobs.push(GoalJob::Remove {
            spec: spec.to_string(),
            settings,
        });
    }

    pub fn add_package_remove(&mut self, package: Package, settings: GoalJobSettings) {
        self.jobs.push(GoalJob::RemovePackage { package, settings });
    }

    pub fn jobs(&self) -> &[GoalJob] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Resolve this goal into a transaction, consuming the goal
    pub fn resolve<E: Engine + ?Sized>(self, engine: &E) -> Result<Transaction> {
        let resolution = engine.resolve_goal(&self)?;
        Ok(Transaction::from_resolution(resolution))
    }
}
