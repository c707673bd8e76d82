// src/lib.rs

//! Quartermaster: declarative package state management
//!
//! Quartermaster drives a system's package set toward a desired state
//! described on the command line: list what is installed, upgradable, or
//! available, and ensure packages are present, latest, or absent.
//!
//! Layers, top to bottom:
//! - `orchestrator`: invocation-level operations (list, ensure) and the
//!   goal/transaction lifecycle
//! - `engine`: the engine contract plus the local SQLite-backed session
//! - `repository`: HTTP metadata sync and artifact downloads
//! - `db`: state database schema, migrations, and models
//! - `config`: configuration file loading and overrides
//! - `version`: epoch:version-release comparison

pub mod config;
pub mod db;
pub mod engine;
pub mod orchestrator;
pub mod repository;
pub mod version;

mod error;

pub use error::{Error, Result};
