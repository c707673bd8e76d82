// src/engine/transaction.rs

//! Resolved transactions
//!
//! The resolver's output: an ordered set of concrete package actions plus
//! any problems encountered while resolving. A transaction is inspected,
//! optionally downloaded, then executed exactly once; `run` consumes
//! `self` so a second execution cannot compile.

use super::{Engine, LoadCallbacks, Package};
use crate::error::Result;

/// A concrete package action within a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Upgrade,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Install => "Install",
            Action::Upgrade => "Upgrade",
            Action::Remove => "Remove",
        }
    }

    /// Whether this action brings a package onto the system
    pub fn is_inbound(&self) -> bool {
        matches!(self, Action::Install | Action::Upgrade)
    }
}

/// One package paired with the action the transaction will take
#[derive(Debug, Clone)]
pub struct TransactionPackage {
    pub package: Package,
    pub action: Action,
}

/// Raw resolver output before it is wrapped in a Transaction
#[derive(Debug, Default)]
pub struct Resolution {
    pub packages: Vec<TransactionPackage>,
    pub problems: Vec<String>,
}

/// Classification of an executed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCode {
    Success,
    Error,
}

/// Result of executing a transaction
#[derive(Debug, Clone)]
pub struct RunResult {
    pub code: RunCode,
    /// Human-readable classification of the result code
    pub message: String,
    /// Problem strings reported by the engine for this execution
    pub problems: Vec<String>,
}

impl RunResult {
    pub fn success() -> Self {
        Self {
            code: RunCode::Success,
            message: "success".to_string(),
            problems: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, problems: Vec<String>) -> Self {
        Self {
            code: RunCode::Error,
            message: message.into(),
            problems,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == RunCode::Success
    }
}

/// The resolved, ordered set of package actions pending execution
#[derive(Debug)]
pub struct Transaction {
    packages: Vec<TransactionPackage>,
    problems: Vec<String>,
}

impl Transaction {
    pub(crate) fn from_resolution(resolution: Resolution) -> Self {
        Self {
            packages: resolution.packages,
            problems: resolution.problems,
        }
    }

    /// Package actions in resolution order
    pub fn packages(&self) -> &[TransactionPackage] {
        &self.packages
    }

    /// Problems reported while resolving
    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Download artifacts for inbound packages not already cached
    pub fn download<E: Engine + ?Sized>(
        &self,
        engine: &E,
        callbacks: &mut dyn LoadCallbacks,
    ) -> Result<()> {
        engine.download(&self.packages, callbacks)
    }

    /// Execute the transaction, consuming it
    pub fn run<E: Engine + ?Sized>(self, engine: &mut E, description: &str) -> Result<RunResult> {
        engine.commit(&self.packages, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package(name: &str) -> Package {
        Package {
            name: name.to_string(),
            arch: "x86_64".to_string(),
            epoch: 0,
            version: "1.0".to_string(),
            release: "1".to_string(),
            repo: "fedora".to_string(),
        }
    }

    #[test]
    fn test_action_strings() {
        assert_eq!(Action::Install.as_str(), "Install");
        assert_eq!(Action::Upgrade.as_str(), "Upgrade");
        assert_eq!(Action::Remove.as_str(), "Remove");
    }

    #[test]
    fn test_inbound_classification() {
        assert!(Action::Install.is_inbound());
        assert!(Action::Upgrade.is_inbound());
        assert!(!Action::Remove.is_inbound());
    }

    #[test]
    fn test_empty_transaction() {
        let txn = Transaction::from_resolution(Resolution::default());
        assert!(txn.is_empty());
        assert!(txn.problems().is_empty());
    }

    #[test]
    fn test_transaction_preserves_resolution_order() {
        let resolution = Resolution {
            packages: vec![
                TransactionPackage {
                    package: sample_package("a"),
                    action: Action::Install,
                },
                TransactionPackage {
                    package: sample_package("b"),
                    action: Action::Remove,
                },
            ],
            problems: vec!["No match for argument: ghost".to_string()],
        };

        let txn = Transaction::from_resolution(resolution);
        assert_eq!(txn.packages().len(), 2);
        assert_eq!(txn.packages()[0].package.name, "a");
        assert_eq!(txn.packages()[1].action, Action::Remove);
        assert_eq!(txn.problems().len(), 1);
    }

    #[test]
    fn test_run_result_constructors() {
        let ok = RunResult::success();
        assert!(ok.is_success());
        assert!(ok.problems.is_empty());

        let failed = RunResult::error("constraint violated", vec!["detail".to_string()]);
        assert!(!failed.is_success());
        assert_eq!(failed.message, "constraint violated");
        assert_eq!(failed.problems.len(), 1);
    }
}
