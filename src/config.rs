// src/config.rs

//! Engine session configuration
//!
//! The engine reads a single JSON configuration file describing where its
//! state database and artifact cache live, plus an optional block of
//! option overrides mirroring the underlying engine's recognized options
//! (candidate selection, signature checking, install root, substitution
//! variables, and so on). Repository definitions are not in this file;
//! they live in the state database.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/quartermaster/config.json";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "QUARTERMASTER_CONFIG";

/// Recognized engine option overrides
///
/// Every field corresponds to an option the engine understands; none of
/// them is interpreted by the orchestration layer itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    /// Prefer the highest-EVR candidate even when an older one would do
    pub best: bool,
    /// Sweep no-longer-needed dependency installs after removals
    pub clean_requirements_on_remove: bool,
    /// Glob patterns excluding packages from candidate selection
    pub excludepkgs: Vec<String>,
    /// Verify package digests before execution
    pub gpgcheck: bool,
    /// Verify repository metadata digests
    pub repo_gpgcheck: bool,
    /// Alternate filesystem root for the database and cache
    pub installroot: Option<PathBuf>,
    /// Install weak dependencies alongside requested packages
    pub install_weak_deps: bool,
    /// Verify TLS certificates when talking to repositories
    pub sslverify: bool,
    /// Report unresolvable specs as problems instead of failing resolution
    pub skip_broken: bool,
}

impl Default for ConfigOverrides {
    fn default() -> Self {
        Self {
            best: false,
            clean_requirements_on_remove: false,
            excludepkgs: Vec::new(),
            gpgcheck: true,
            repo_gpgcheck: false,
            installroot: None,
            install_weak_deps: true,
            sslverify: true,
            skip_broken: true,
        }
    }
}

/// Engine session configuration, loaded once per invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// State database path
    pub db_path: PathBuf,
    /// Directory for downloaded package artifacts
    pub cache_dir: PathBuf,
    /// Substitution variables expanded in repository URLs (e.g. releasever)
    #[serde(default)]
    pub vars: HashMap<String, String>,
    /// Option overrides applied at session construction
    #[serde(default)]
    pub overrides: ConfigOverrides,
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let config: EngineConfig = serde_json::from_str(&raw).map_err(|e| {
            Error::ConfigError(format!("Malformed config {}: {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Resolve the configuration file path from the environment, falling
    /// back to the system default.
    pub fn resolve_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Database path with any installroot override applied
    pub fn effective_db_path(&self) -> PathBuf {
        rooted(self.overrides.installroot.as_deref(), &self.db_path)
    }

    /// Cache directory with any installroot override applied
    pub fn effective_cache_dir(&self) -> PathBuf {
        rooted(self.overrides.installroot.as_deref(), &self.cache_dir)
    }

    /// Expand `$var` references in a repository URL
    pub fn expand_vars(&self, url: &str) -> String {
        let mut expanded = url.to_string();
        for (key, value) in &self.vars {
            expanded = expanded.replace(&format!("${}", key), value);
        }
        expanded
    }
}

/// Prefix a path with an install root, if one is set
fn rooted(root: Option<&Path>, path: &Path) -> PathBuf {
    match root {
        Some(root) => {
            // Joining an absolute path would discard the root
            let relative = path.strip_prefix("/").unwrap_or(path);
            root.join(relative)
        }
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> EngineConfig {
        EngineConfig {
            db_path: PathBuf::from("/var/lib/quartermaster/state.db"),
            cache_dir: PathBuf::from("/var/cache/quartermaster"),
            vars: HashMap::from([("releasever".to_string(), "38".to_string())]),
            overrides: ConfigOverrides::default(),
        }
    }

    #[test]
    fn test_load_minimal_config() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            r#"{"db_path": "/tmp/q.db", "cache_dir": "/tmp/cache"}"#,
        )
        .unwrap();

        let config = EngineConfig::load(temp.path()).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/q.db"));
        assert!(config.vars.is_empty());
        assert!(config.overrides.gpgcheck);
        assert!(config.overrides.sslverify);
    }

    #[test]
    fn test_load_with_overrides() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            r#"{
                "db_path": "/tmp/q.db",
                "cache_dir": "/tmp/cache",
                "vars": {"releasever": "38"},
                "overrides": {
                    "best": true,
                    "gpgcheck": false,
                    "excludepkgs": ["kernel*"],
                    "installroot": "/mnt/sysroot"
                }
            }"#,
        )
        .unwrap();

        let config = EngineConfig::load(temp.path()).unwrap();
        assert!(config.overrides.best);
        assert!(!config.overrides.gpgcheck);
        assert_eq!(config.overrides.excludepkgs, vec!["kernel*".to_string()]);
        // Unspecified overrides keep their defaults
        assert!(config.overrides.install_weak_deps);
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "{not json").unwrap();

        let result = EngineConfig::load(temp.path());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_installroot_prefixes_paths() {
        let mut config = sample_config();
        config.overrides.installroot = Some(PathBuf::from("/mnt/sysroot"));

        assert_eq!(
            config.effective_db_path(),
            PathBuf::from("/mnt/sysroot/var/lib/quartermaster/state.db")
        );
        assert_eq!(
            config.effective_cache_dir(),
            PathBuf::from("/mnt/sysroot/var/cache/quartermaster")
        );
    }

    #[test]
    fn test_no_installroot_leaves_paths() {
        let config = sample_config();
        assert_eq!(
            config.effective_db_path(),
            PathBuf::from("/var/lib/quartermaster/state.db")
        );
    }

    #[test]
    fn test_expand_vars() {
        let config = sample_config();
        assert_eq!(
            config.expand_vars("https://mirror.example.com/f$releasever/x86_64"),
            "https://mirror.example.com/f38/x86_64"
        );
        // Unknown variables pass through untouched
        assert_eq!(
            config.expand_vars("https://mirror.example.com/$basearch"),
            "https://mirror.example.com/$basearch"
        );
    }
}
