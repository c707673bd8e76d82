// src/engine/local.rs

//! The local engine session
//!
//! `LocalEngine` implements the engine contract against a SQLite state
//! database and HTTP JSON repository metadata. It deliberately performs no
//! dependency solving: goal resolution maps each intent to at most the
//! packages the intent itself names, choosing the best candidate by EVR.
//! Unneeded-package detection is set arithmetic over recorded install
//! reasons and requires lists.

use super::goal::{Goal, GoalJob};
use super::transaction::{Action, Resolution, RunResult, TransactionPackage};
use super::{
    COMMANDLINE_REPO, Engine, LoadCallbacks, Package, PackageFilter, RepoRecord,
    ResolveSpecSettings, SignatureCheck,
};
use crate::config::EngineConfig;
use crate::db::{self, models};
use crate::error::{Error, Result};
use crate::repository::{self, RepositoryClient};
use glob::Pattern;
use rusqlite::Connection;
use std::fs;
use tracing::{debug, info, warn};

/// Engine session backed by the state database and HTTP metadata
pub struct LocalEngine {
    conn: Connection,
    config: EngineConfig,
    client: RepositoryClient,
}

impl LocalEngine {
    /// Open a session from configuration
    ///
    /// Opens (and migrates) the state database and builds the HTTP client
    /// according to the sslverify override. Any failure here is fatal to
    /// the invocation.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let client = RepositoryClient::new(config.overrides.sslverify)?;
        let conn = db::open(&config.effective_db_path())?;

        info!(
            "Engine session opened, state database {}",
            config.effective_db_path().display()
        );

        Ok(Self {
            conn,
            config,
            client,
        })
    }

    /// Build a session over an existing connection (tests, dry runs)
    pub fn with_connection(conn: Connection, config: EngineConfig) -> Result<Self> {
        let client = RepositoryClient::new(config.overrides.sslverify)?;
        Ok(Self {
            conn,
            config,
            client,
        })
    }

    /// Direct access to the state database
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Available rows with excludepkgs globs applied
    fn available_rows(&self) -> Result<Vec<models::AvailablePackage>> {
        let rows = models::AvailablePackage::list_all(&self.conn)?;
        Ok(rows
            .into_iter()
            .filter(|row| !self.is_excluded(&row.name))
            .collect())
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.config
            .overrides
            .excludepkgs
            .iter()
            .any(|pattern| glob_or_literal_match(pattern, name))
    }

    /// Exact NEVRA lookup in the available index, preferring the package's
    /// own repository when several carry the same build.
    fn find_available_exact(&self, pkg: &Package) -> Result<Option<models::AvailablePackage>> {
        let mut rows: Vec<_> = models::AvailablePackage::find_by_name(&self.conn, &pkg.name)?
            .into_iter()
            .filter(|row| {
                row.epoch == pkg.epoch
                    && row.version == pkg.version
                    && row.release == pkg.release
                    && row.arch == pkg.arch
            })
            .collect();

        if let Some(pos) = rows.iter().position(|row| row.repo_id == pkg.repo) {
            return Ok(Some(rows.swap_remove(pos)));
        }
        Ok(rows.into_iter().next())
    }

    /// Best available candidate for an installed package, if strictly newer
    fn upgrade_candidate(
        &self,
        installed: &models::InstalledPackage,
        available: &[models::AvailablePackage],
    ) -> Option<Package> {
        let current = crate::version::Evr::new(
            installed.epoch,
            &installed.version,
            &installed.release,
        );

        available
            .iter()
            .filter(|row| {
                row.name == installed.name
                    && (row.arch == installed.arch || row.arch == "noarch")
            })
            .map(available_to_package)
            .filter(|candidate| candidate.evr() > current)
            .max_by(|a, b| a.evr().cmp(&b.evr()))
    }

    fn push_unique(resolution: &mut Resolution, package: Package, action: Action) {
        let duplicate = resolution
            .packages
            .iter()
            .any(|tp| tp.action == action && tp.package == package);
        if !duplicate {
            resolution.packages.push(TransactionPackage { package, action });
        }
    }

    fn resolve_install(
        &self,
        resolution: &mut Resolution,
        spec: &str,
        installed: &[models::InstalledPackage],
        available: &[models::AvailablePackage],
    ) {
        let candidates: Vec<Package> = available
            .iter()
            .map(available_to_package)
            .filter(|pkg| spec_matches(spec, pkg, true))
            .collect();

        if candidates.is_empty() {
            resolution
                .problems
                .push(format!("No match for argument: {}", spec));
            return;
        }

        for best in best_per_name(candidates) {
            let current = installed
                .iter()
                .find(|row| row.name == best.name && (row.arch == best.arch || best.arch == "noarch"));

            match current {
                Some(row) => {
                    let current_evr =
                        crate::version::Evr::new(row.epoch, &row.version, &row.release);
                    if best.evr() > current_evr {
                        Self::push_unique(resolution, best, Action::Upgrade);
                    } else {
                        // Already satisfied at this or a newer EVR
                        debug!("{} already installed, nothing to do", row.name);
                    }
                }
                None => Self::push_unique(resolution, best, Action::Install),
            }
        }
    }

    fn resolve_upgrade(
        &self,
        resolution: &mut Resolution,
        spec: &str,
        installed: &[models::InstalledPackage],
        available: &[models::AvailablePackage],
    ) {
        let matched: Vec<_> = installed
            .iter()
            .filter(|row| spec_matches(spec, &installed_to_package(row), true))
            .collect();

        if matched.is_empty() {
            resolution
                .problems
                .push(format!("No match for argument: {}", spec));
            return;
        }

        for row in matched {
            if let Some(candidate) = self.upgrade_candidate(row, available) {
                Self::push_unique(resolution, candidate, Action::Upgrade);
            }
        }
    }
}

impl Engine for LocalEngine {
    fn repositories(&self) -> Result<Vec<RepoRecord>> {
        let repos = models::Repository::list_all(&self.conn)?;
        Ok(repos
            .into_iter()
            .map(|repo| RepoRecord {
                repoid: repo.repo_id,
                enabled: repo.enabled,
                url: repo.url,
                last_sync: repo.last_sync,
            })
            .collect())
    }

    fn set_repos_enabled(&mut self, id_glob: &str, enabled: bool) -> Result<usize> {
        let mut changed = 0;
        for mut repo in models::Repository::list_all(&self.conn)? {
            if glob_or_literal_match(id_glob, &repo.repo_id) && repo.enabled != enabled {
                repo.enabled = enabled;
                repo.update(&self.conn)?;
                changed += 1;
            }
        }
        info!(
            "{} repositories {} by pattern {}",
            changed,
            if enabled { "enabled" } else { "disabled" },
            id_glob
        );
        Ok(changed)
    }

    fn refresh(&mut self, callbacks: &mut dyn LoadCallbacks) -> Result<()> {
        for mut repo in models::Repository::list_enabled(&self.conn)? {
            if !repository::needs_sync(&repo) {
                debug!("Repository {} metadata is current, skipping", repo.repo_id);
                continue;
            }

            match repository::sync_repository(&self.conn, &self.client, &self.config, &mut repo) {
                Ok(count) => callbacks.repo_loaded(&repo.repo_id, count),
                Err(e) => {
                    callbacks.repo_failed(&repo.repo_id, &e.to_string());
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn query(&self, filter: PackageFilter) -> Result<Vec<Package>> {
        match filter {
            PackageFilter::Installed => {
                let rows = models::InstalledPackage::list_all(&self.conn)?;
                Ok(rows.iter().map(installed_to_package).collect())
            }
            PackageFilter::Available => {
                let rows = self.available_rows()?;
                Ok(rows.iter().map(available_to_package).collect())
            }
            PackageFilter::Upgrades => {
                let installed = models::InstalledPackage::list_all(&self.conn)?;
                let available = self.available_rows()?;
                Ok(installed
                    .iter()
                    .filter_map(|row| self.upgrade_candidate(row, &available))
                    .collect())
            }
            PackageFilter::Unneeded => {
                let rows = unneeded_rows(&self.conn)?;
                Ok(rows.iter().map(installed_to_package).collect())
            }
        }
    }

    fn resolve_spec(&self, spec: &str, settings: &ResolveSpecSettings) -> Result<Vec<Package>> {
        let mut results = Vec::new();

        if settings.match_installed {
            for row in models::InstalledPackage::list_all(&self.conn)? {
                let pkg = installed_to_package(&row);
                if spec_matches(spec, &pkg, settings.with_nevra) {
                    results.push(pkg);
                }
            }
        }

        if settings.match_available {
            for row in self.available_rows()? {
                let pkg = available_to_package(&row);
                if spec_matches(spec, &pkg, settings.with_nevra) {
                    results.push(pkg);
                }
            }
        }

        Ok(results)
    }

    fn resolve_goal(&self, goal: &Goal) -> Result<Resolution> {
        let installed = models::InstalledPackage::list_all(&self.conn)?;
        let available = self.available_rows()?;

        let mut resolution = Resolution::default();

        for job in goal.jobs() {
            match job {
                GoalJob::Install { spec, .. } => {
                    self.resolve_install(&mut resolution, spec, &installed, &available);
                }
                GoalJob::Upgrade { spec, .. } => {
                    self.resolve_upgrade(&mut resolution, spec, &installed, &available);
                }
                GoalJob::UpgradeAll { .. } => {
                    for row in &installed {
                        if let Some(candidate) = self.upgrade_candidate(row, &available) {
                            Self::push_unique(&mut resolution, candidate, Action::Upgrade);
                        }
                    }
                }
                GoalJob::Remove { spec, .. } => {
                    // Removing something not installed is already the
                    // desired state, so a zero-match spec is not a problem.
                    for row in &installed {
                        let pkg = installed_to_package(row);
                        if spec_matches(spec, &pkg, true) {
                            Self::push_unique(&mut resolution, pkg, Action::Remove);
                        }
                    }
                }
                GoalJob::RemovePackage { package, .. } => {
                    Self::push_unique(&mut resolution, package.clone(), Action::Remove);
                }
            }
        }

        Ok(resolution)
    }

    fn check_signature(&self, package: &Package) -> Result<SignatureCheck> {
        if !self.config.overrides.gpgcheck {
            return Ok(SignatureCheck::Skipped(
                "signature checking disabled".to_string(),
            ));
        }
        if package.repo == COMMANDLINE_REPO {
            return Ok(SignatureCheck::Skipped(
                "command-line package".to_string(),
            ));
        }

        let row = match self.find_available_exact(package)? {
            Some(row) => row,
            None => {
                return Ok(SignatureCheck::Failed(format!(
                    "no repository metadata for {}",
                    package.nevra()
                )));
            }
        };

        if row.checksum.len() != 64 || !row.checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(SignatureCheck::Failed(
                "malformed digest in repository metadata".to_string(),
            ));
        }

        // An already-cached artifact must match the recorded digest
        let cached = repository::artifact_path(&row, &self.config.effective_cache_dir());
        if cached.exists() {
            if let Err(e) = repository::verify_checksum(&cached, &row.checksum) {
                return Ok(SignatureCheck::Failed(e.to_string()));
            }
        }

        Ok(SignatureCheck::Ok)
    }

    fn download(
        &self,
        packages: &[TransactionPackage],
        callbacks: &mut dyn LoadCallbacks,
    ) -> Result<()> {
        let cache_dir = self.config.effective_cache_dir();

        for tp in packages {
            if !tp.action.is_inbound() || tp.package.repo == COMMANDLINE_REPO {
                continue;
            }

            fs::create_dir_all(&cache_dir)?;

            let row = self.find_available_exact(&tp.package)?.ok_or_else(|| {
                Error::NotFoundError(format!(
                    "{} is not in the available index",
                    tp.package.nevra()
                ))
            })?;

            let nevra = tp.package.nevra();
            callbacks.download_start(&nevra);
            repository::download_package(&self.client, &row, &cache_dir)?;
            callbacks.download_done(&nevra);
        }

        Ok(())
    }

    fn commit(&mut self, packages: &[TransactionPackage], description: &str) -> Result<RunResult> {
        if packages.is_empty() {
            debug!("Empty transaction, nothing to apply");
            return Ok(RunResult::success());
        }

        // Snapshot the available requires before entering the transaction
        let mut requires = Vec::with_capacity(packages.len());
        for tp in packages {
            let raw = if tp.action.is_inbound() {
                self.find_available_exact(&tp.package)?
                    .and_then(|row| row.requires)
            } else {
                None
            };
            requires.push(raw);
        }

        let sweep = self.config.overrides.clean_requirements_on_remove
            && packages.iter().any(|tp| tp.action == Action::Remove);
        let action_count = packages.len() as i64;
        let description = description.to_string();

        let applied = db::transaction(&mut self.conn, |tx| {
            for (tp, requires_json) in packages.iter().zip(requires.iter()) {
                apply_action(tx, tp, requires_json.as_deref())?;
            }

            if sweep {
                sweep_unneeded(tx)?;
            }

            models::HistoryEntry::new(description, action_count).insert(tx)?;
            Ok(())
        });

        match applied {
            Ok(()) => Ok(RunResult::success()),
            Err(e) => {
                warn!("Transaction execution failed: {}", e);
                Ok(RunResult::error(
                    "transaction could not be applied",
                    vec![e.to_string()],
                ))
            }
        }
    }
}

/// Apply one package action inside the state transaction
fn apply_action(
    conn: &Connection,
    tp: &TransactionPackage,
    requires_json: Option<&str>,
) -> Result<()> {
    let pkg = &tp.package;
    match tp.action {
        Action::Install => {
            let mut row = models::InstalledPackage::new(
                pkg.name.clone(),
                pkg.epoch,
                pkg.version.clone(),
                pkg.release.clone(),
                pkg.arch.clone(),
                pkg.repo.clone(),
                models::InstallReason::User,
            );
            row.requires = requires_json.map(str::to_string);
            row.insert(conn)?;
        }
        Action::Upgrade => {
            let current = models::InstalledPackage::find_by_name(conn, &pkg.name)?
                .into_iter()
                .find(|row| row.arch == pkg.arch || pkg.arch == "noarch")
                .ok_or_else(|| {
                    Error::NotFoundError(format!("{} is not installed, cannot upgrade", pkg.name))
                })?;

            models::InstalledPackage::update_evr(
                conn,
                current.id.unwrap_or_default(),
                pkg.epoch,
                &pkg.version,
                &pkg.release,
                &pkg.repo,
                requires_json,
            )?;
        }
        Action::Remove => {
            let matches: Vec<_> = models::InstalledPackage::find_by_name(conn, &pkg.name)?
                .into_iter()
                .filter(|row| row.arch == pkg.arch)
                .collect();
            if matches.is_empty() {
                return Err(Error::NotFoundError(format!(
                    "{} is not installed, cannot remove",
                    pkg.name
                )));
            }
            for row in matches {
                models::InstalledPackage::delete(conn, row.id.unwrap_or_default())?;
            }
        }
    }
    Ok(())
}

/// Installed dependency-reason packages no longer named in any other
/// installed package's requires list.
fn unneeded_rows(conn: &Connection) -> Result<Vec<models::InstalledPackage>> {
    let installed = models::InstalledPackage::list_all(conn)?;

    let required: std::collections::HashSet<String> = installed
        .iter()
        .flat_map(|row| row.requires_list())
        .collect();

    Ok(installed
        .into_iter()
        .filter(|row| {
            row.install_reason == models::InstallReason::Dependency
                && !required.contains(&row.name)
        })
        .collect())
}

/// Remove unneeded dependency installs until none remain
fn sweep_unneeded(conn: &Connection) -> Result<()> {
    loop {
        let unneeded = unneeded_rows(conn)?;
        if unneeded.is_empty() {
            return Ok(());
        }
        for row in unneeded {
            debug!("Sweeping unneeded dependency {}", row.name);
            models::InstalledPackage::delete(conn, row.id.unwrap_or_default())?;
        }
    }
}

fn installed_to_package(row: &models::InstalledPackage) -> Package {
    Package {
        name: row.name.clone(),
        arch: row.arch.clone(),
        epoch: row.epoch,
        version: row.version.clone(),
        release: row.release.clone(),
        repo: row.repo_id.clone(),
    }
}

fn available_to_package(row: &models::AvailablePackage) -> Package {
    Package {
        name: row.name.clone(),
        arch: row.arch.clone(),
        epoch: row.epoch,
        version: row.version.clone(),
        release: row.release.clone(),
        repo: row.repo_id.clone(),
    }
}

/// Glob match with a literal-equality fallback for invalid patterns
fn glob_or_literal_match(pattern: &str, value: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(pattern) => pattern.matches(value),
        Err(_) => pattern == value,
    }
}

/// Match a free-form spec against a package
///
/// Tries the plain name first, then NEVRA-qualified forms when enabled.
fn spec_matches(spec: &str, pkg: &Package, with_nevra: bool) -> bool {
    if glob_or_literal_match(spec, &pkg.name) {
        return true;
    }
    if !with_nevra {
        return false;
    }

    let forms = [
        format!("{}.{}", pkg.name, pkg.arch),
        format!("{}-{}", pkg.name, pkg.version),
        format!("{}-{}-{}", pkg.name, pkg.version, pkg.release),
        format!("{}-{}-{}.{}", pkg.name, pkg.version, pkg.release, pkg.arch),
        format!(
            "{}-{}:{}-{}",
            pkg.name, pkg.epoch, pkg.version, pkg.release
        ),
        pkg.nevra(),
    ];
    forms.iter().any(|form| glob_or_literal_match(spec, form))
}

/// Keep only the highest-EVR candidate per package name
fn best_per_name(candidates: Vec<Package>) -> Vec<Package> {
    let mut best: Vec<Package> = Vec::new();
    for candidate in candidates {
        match best.iter_mut().find(|pkg| pkg.name == candidate.name) {
            Some(existing) => {
                if candidate.evr() > existing.evr() {
                    *existing = candidate;
                }
            }
            None => best.push(candidate),
        }
    }
    best
}
