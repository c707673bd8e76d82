// src/db/models.rs

//! Data models for Quartermaster database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting
//! records.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Why a package ended up installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    User,
    Dependency,
}

impl InstallReason {
    pub fn as_str(&self) -> &str {
        match self {
            InstallReason::User => "user",
            InstallReason::Dependency => "dependency",
        }
    }
}

impl FromStr for InstallReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(InstallReason::User),
            "dependency" => Ok(InstallReason::Dependency),
            _ => Err(format!("Invalid install reason: {}", s)),
        }
    }
}

/// An installed package row
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub repo_id: String,
    pub install_reason: InstallReason,
    /// JSON array of required package names, captured at install time
    pub requires: Option<String>,
    pub installed_at: Option<String>,
}

impl InstalledPackage {
    /// Create a new InstalledPackage
    pub fn new(
        name: String,
        epoch: u64,
        version: String,
        release: String,
        arch: String,
        repo_id: String,
        install_reason: InstallReason,
    ) -> Self {
        Self {
            id: None,
            name,
            epoch,
            version,
            release,
            arch,
            repo_id,
            install_reason,
            requires: None,
            installed_at: None,
        }
    }

    /// Parse the requires column into a list of package names
    pub fn requires_list(&self) -> Vec<String> {
        self.requires
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Insert this package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO installed_packages (name, epoch, version, release, arch, repo_id, install_reason, requires)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.name,
                self.epoch as i64,
                &self.version,
                &self.release,
                &self.arch,
                &self.repo_id,
                self.install_reason.as_str(),
                &self.requires,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find installed packages by exact name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, epoch, version, release, arch, repo_id, install_reason, requires, installed_at
             FROM installed_packages WHERE name = ?1",
        )?;

        let packages = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// List all installed packages
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, epoch, version, release, arch, repo_id, install_reason, requires, installed_at
             FROM installed_packages ORDER BY name, arch",
        )?;

        let packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Replace the EVR and origin of an installed package (upgrade path)
    pub fn update_evr(
        conn: &Connection,
        id: i64,
        epoch: u64,
        version: &str,
        release: &str,
        repo_id: &str,
        requires: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "UPDATE installed_packages
             SET epoch = ?1, version = ?2, release = ?3, repo_id = ?4, requires = ?5,
                 installed_at = CURRENT_TIMESTAMP
             WHERE id = ?6",
            params![epoch as i64, version, release, repo_id, requires, id],
        )?;
        Ok(())
    }

    /// Delete an installed package by ID
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM installed_packages WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Convert a database row to an InstalledPackage
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let reason_str: String = row.get(7)?;
        let install_reason = reason_str.parse::<InstallReason>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            epoch: row.get::<_, i64>(2)? as u64,
            version: row.get(3)?,
            release: row.get(4)?,
            arch: row.get(5)?,
            repo_id: row.get(6)?,
            install_reason,
            requires: row.get(8)?,
            installed_at: row.get(9)?,
        })
    }
}

/// Repository represents a remote package source
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: Option<i64>,
    pub repo_id: String,
    pub url: String,
    pub enabled: bool,
    pub metadata_expire: i32,
    pub last_sync: Option<String>,
    pub created_at: Option<String>,
}

impl Repository {
    /// Create a new Repository
    pub fn new(repo_id: String, url: String) -> Self {
        Self {
            id: None,
            repo_id,
            url,
            enabled: true,
            metadata_expire: 3600, // Default: 1 hour
            last_sync: None,
            created_at: None,
        }
    }

    /// Insert this repository into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories (repo_id, url, enabled, metadata_expire)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &self.repo_id,
                &self.url,
                self.enabled as i32,
                &self.metadata_expire,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a repository by its identifier
    pub fn find_by_repo_id(conn: &Connection, repo_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, url, enabled, metadata_expire, last_sync, created_at
             FROM repositories WHERE repo_id = ?1",
        )?;

        let repo = stmt.query_row([repo_id], Self::from_row).optional()?;

        Ok(repo)
    }

    /// List all repositories
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, url, enabled, metadata_expire, last_sync, created_at
             FROM repositories ORDER BY repo_id",
        )?;

        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(repos)
    }

    /// List enabled repositories
    pub fn list_enabled(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, url, enabled, metadata_expire, last_sync, created_at
             FROM repositories WHERE enabled = 1 ORDER BY repo_id",
        )?;

        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(repos)
    }

    /// Update repository state (enabled flag, sync timestamp)
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            crate::error::Error::InitError("Cannot update repository without ID".to_string())
        })?;

        conn.execute(
            "UPDATE repositories SET repo_id = ?1, url = ?2, enabled = ?3,
             metadata_expire = ?4, last_sync = ?5 WHERE id = ?6",
            params![
                &self.repo_id,
                &self.url,
                self.enabled as i32,
                &self.metadata_expire,
                &self.last_sync,
                id,
            ],
        )?;

        Ok(())
    }

    /// Delete a repository by ID
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Convert a database row to a Repository
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            repo_id: row.get(1)?,
            url: row.get(2)?,
            enabled: row.get::<_, i32>(3)? != 0,
            metadata_expire: row.get(4)?,
            last_sync: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// AvailablePackage represents a package in the synced repository index
#[derive(Debug, Clone)]
pub struct AvailablePackage {
    pub id: Option<i64>,
    pub repository_id: i64,
    /// Identifier of the owning repository, filled by join queries
    pub repo_id: String,
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub checksum: String,
    pub size: i64,
    pub download_url: String,
    /// JSON array of required package names
    pub requires: Option<String>,
    pub synced_at: Option<String>,
}

const AVAILABLE_SELECT: &str =
    "SELECT a.id, a.repository_id, r.repo_id, a.name, a.epoch, a.version, a.release, a.arch,
            a.checksum, a.size, a.download_url, a.requires, a.synced_at
     FROM available_packages a JOIN repositories r ON r.id = a.repository_id";

impl AvailablePackage {
    /// Create a new AvailablePackage
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_id: i64,
        repo_id: String,
        name: String,
        epoch: u64,
        version: String,
        release: String,
        arch: String,
        checksum: String,
        size: i64,
        download_url: String,
    ) -> Self {
        Self {
            id: None,
            repository_id,
            repo_id,
            name,
            epoch,
            version,
            release,
            arch,
            checksum,
            size,
            download_url,
            requires: None,
            synced_at: None,
        }
    }

    /// Insert this available package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO available_packages
             (repository_id, name, epoch, version, release, arch, checksum, size, download_url, requires)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &self.repository_id,
                &self.name,
                self.epoch as i64,
                &self.version,
                &self.release,
                &self.arch,
                &self.checksum,
                &self.size,
                &self.download_url,
                &self.requires,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find available packages by exact name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{} WHERE a.name = ?1", AVAILABLE_SELECT))?;

        let packages = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// List all available packages from enabled repositories
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE r.enabled = 1 ORDER BY a.name, a.arch",
            AVAILABLE_SELECT
        ))?;

        let packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Delete all packages for a repository (used when syncing)
    pub fn delete_by_repository(conn: &Connection, repository_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM available_packages WHERE repository_id = ?1",
            [repository_id],
        )?;
        Ok(())
    }

    /// Parse the requires column into a list of package names
    pub fn requires_list(&self) -> Vec<String> {
        self.requires
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Convert a database row to an AvailablePackage
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            repository_id: row.get(1)?,
            repo_id: row.get(2)?,
            name: row.get(3)?,
            epoch: row.get::<_, i64>(4)? as u64,
            version: row.get(5)?,
            release: row.get(6)?,
            arch: row.get(7)?,
            checksum: row.get(8)?,
            size: row.get(9)?,
            download_url: row.get(10)?,
            requires: row.get(11)?,
            synced_at: row.get(12)?,
        })
    }
}

/// A HistoryEntry records one executed transaction
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: Option<i64>,
    pub description: String,
    pub action_count: i64,
    pub applied_at: Option<String>,
}

impl HistoryEntry {
    /// Create a new HistoryEntry
    pub fn new(description: String, action_count: i64) -> Self {
        Self {
            id: None,
            description,
            action_count,
            applied_at: None,
        }
    }

    /// Insert this history entry into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO history (description, action_count) VALUES (?1, ?2)",
            params![&self.description, &self.action_count],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// List all history entries, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, action_count, applied_at
             FROM history ORDER BY id DESC",
        )?;

        let entries = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Convert a database row to a HistoryEntry
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            action_count: row.get(2)?,
            applied_at: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn sample_installed(name: &str, version: &str) -> InstalledPackage {
        InstalledPackage::new(
            name.to_string(),
            0,
            version.to_string(),
            "1.fc38".to_string(),
            "x86_64".to_string(),
            "fedora".to_string(),
            InstallReason::User,
        )
    }

    #[test]
    fn test_installed_package_crud() {
        let (_temp, conn) = create_test_db();

        let mut pkg = sample_installed("zlib", "1.2.13");
        pkg.requires = Some(r#"["glibc"]"#.to_string());

        let id = pkg.insert(&conn).unwrap();
        assert!(id > 0);
        assert_eq!(pkg.id, Some(id));

        let by_name = InstalledPackage::find_by_name(&conn, "zlib").unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].version, "1.2.13");
        assert_eq!(by_name[0].install_reason, InstallReason::User);
        assert_eq!(by_name[0].requires_list(), vec!["glibc".to_string()]);

        let all = InstalledPackage::list_all(&conn).unwrap();
        assert_eq!(all.len(), 1);

        InstalledPackage::delete(&conn, id).unwrap();
        assert!(InstalledPackage::find_by_name(&conn, "zlib")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_installed_package_update_evr() {
        let (_temp, conn) = create_test_db();

        let mut pkg = sample_installed("zlib", "1.2.13");
        let id = pkg.insert(&conn).unwrap();

        InstalledPackage::update_evr(&conn, id, 0, "1.2.14", "1.fc38", "updates", None).unwrap();

        let reloaded = InstalledPackage::find_by_name(&conn, "zlib").unwrap();
        assert_eq!(reloaded[0].version, "1.2.14");
        assert_eq!(reloaded[0].repo_id, "updates");
    }

    #[test]
    fn test_requires_list_handles_missing_and_malformed() {
        let mut pkg = sample_installed("zlib", "1.2.13");
        assert!(pkg.requires_list().is_empty());

        pkg.requires = Some("not json".to_string());
        assert!(pkg.requires_list().is_empty());
    }

    #[test]
    fn test_repository_crud() {
        let (_temp, conn) = create_test_db();

        let mut repo = Repository::new(
            "fedora".to_string(),
            "https://example.com/fedora".to_string(),
        );
        let id = repo.insert(&conn).unwrap();
        assert!(id > 0);

        let found = Repository::find_by_repo_id(&conn, "fedora").unwrap().unwrap();
        assert!(found.enabled);
        assert_eq!(found.metadata_expire, 3600);

        // Disable and update
        let mut updated = found.clone();
        updated.enabled = false;
        updated.last_sync = Some("2024-01-01T00:00:00Z".to_string());
        updated.update(&conn).unwrap();

        assert!(Repository::list_enabled(&conn).unwrap().is_empty());
        assert_eq!(Repository::list_all(&conn).unwrap().len(), 1);

        Repository::delete(&conn, id).unwrap();
        assert!(Repository::find_by_repo_id(&conn, "fedora")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_available_package_crud() {
        let (_temp, conn) = create_test_db();

        let mut repo = Repository::new(
            "fedora".to_string(),
            "https://example.com/fedora".to_string(),
        );
        let repo_pk = repo.insert(&conn).unwrap();

        let mut pkg = AvailablePackage::new(
            repo_pk,
            "fedora".to_string(),
            "zlib".to_string(),
            0,
            "1.2.13".to_string(),
            "3.fc38".to_string(),
            "x86_64".to_string(),
            "aa".repeat(32),
            102400,
            "https://example.com/fedora/zlib-1.2.13-3.fc38.x86_64.rpm".to_string(),
        );
        pkg.insert(&conn).unwrap();

        let found = AvailablePackage::find_by_name(&conn, "zlib").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].repo_id, "fedora");

        let all = AvailablePackage::list_all(&conn).unwrap();
        assert_eq!(all.len(), 1);

        AvailablePackage::delete_by_repository(&conn, repo_pk).unwrap();
        assert!(AvailablePackage::list_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_list_all_skips_disabled_repositories() {
        let (_temp, conn) = create_test_db();

        let mut repo = Repository::new(
            "fedora".to_string(),
            "https://example.com/fedora".to_string(),
        );
        let repo_pk = repo.insert(&conn).unwrap();

        let mut pkg = AvailablePackage::new(
            repo_pk,
            "fedora".to_string(),
            "zlib".to_string(),
            0,
            "1.2.13".to_string(),
            "3.fc38".to_string(),
            "x86_64".to_string(),
            "aa".repeat(32),
            102400,
            "https://example.com/zlib.rpm".to_string(),
        );
        pkg.insert(&conn).unwrap();

        let mut stored = Repository::find_by_repo_id(&conn, "fedora").unwrap().unwrap();
        stored.enabled = false;
        stored.update(&conn).unwrap();

        assert!(AvailablePackage::list_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_history_entry() {
        let (_temp, conn) = create_test_db();

        let mut entry = HistoryEntry::new("quartermaster".to_string(), 3);
        let id = entry.insert(&conn).unwrap();
        assert!(id > 0);

        let all = HistoryEntry::list_all(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "quartermaster");
        assert_eq!(all[0].action_count, 3);
        assert!(all[0].applied_at.is_some());
    }
}
