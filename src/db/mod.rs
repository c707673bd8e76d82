// src/db/mod.rs

//! Database layer for Quartermaster
//!
//! This module handles all SQLite operations including:
//! - Database initialization and schema creation
//! - Connection management
//! - Transaction handling
//! - CRUD operations for installed packages, repositories, and the
//!   synced available-package index

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

pub mod models;
pub mod schema;

/// Open the state database, creating and migrating it as needed
///
/// This is idempotent - calling it on an existing database is safe.
pub fn open(db_path: &Path) -> Result<Connection> {
    debug!("Opening state database at: {}", db_path.display());

    // Create parent directories if they don't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::InitError(format!("Failed to create database directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;

    // Set pragmas for better performance and reliability
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    Ok(conn)
}

/// Open an in-memory database with the full schema, for tests and dry runs
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Run a closure inside a SQLite transaction
///
/// Commits when the closure returns Ok, rolls back on Err.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&rusqlite::Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
