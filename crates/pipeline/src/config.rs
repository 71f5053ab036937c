//! Sync pipeline configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use medwatch_core::availability::ClassificationPolicy;
use medwatch_core::change_detection::ChangeDetectionStrategy;
use medwatch_core::error::CoreError;
use medwatch_core::registry::RegistryFile;

use crate::source::{DirectoryRegistrySource, HttpRegistrySource, RegistrySource};

/// Public download endpoint of the regulator's open-data files. The file
/// name is appended.
pub const DEFAULT_REGISTRY_BASE_URL: &str =
    "https://base-donnees-publique.medicaments.gouv.fr/telechargement.php?fichier=";

/// Where registry files are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Http { urls: HashMap<RegistryFile, String> },
    Directory(PathBuf),
}

impl SourceConfig {
    /// One URL per registry file under `base_url`.
    pub fn http_from_base(base_url: &str) -> Self {
        let urls = [
            RegistryFile::Catalog,
            RegistryFile::Composition,
            RegistryFile::Shortage,
            RegistryFile::GenericGroups,
        ]
        .into_iter()
        .map(|file| (file, format!("{base_url}{}", file.default_file_name())))
        .collect();
        Self::Http { urls }
    }

    /// Construct the configured reader.
    pub fn build(&self, timeout: Duration) -> Result<Arc<dyn RegistrySource>, reqwest::Error> {
        let source: Arc<dyn RegistrySource> = match self {
            Self::Http { urls } => Arc::new(HttpRegistrySource::new(urls.clone(), timeout)?),
            Self::Directory(dir) => Arc::new(DirectoryRegistrySource::new(dir.clone())),
        };
        Ok(source)
    }
}

/// Configuration for one sync pass.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: SourceConfig,
    /// Upper bound for fetching a single file.
    pub fetch_timeout: Duration,
    /// Concurrent per-product upserts.
    pub sync_workers: usize,
    /// Concurrent change-event fan-outs.
    pub fanout_concurrency: usize,
    /// Rows per catalog upsert statement.
    pub catalog_batch_size: usize,
    /// Directory keeping the previous raw shortage file.
    pub snapshot_dir: Option<PathBuf>,
    pub classification: ClassificationPolicy,
    pub change_detection: ChangeDetectionStrategy,
    /// Minimum time between two notifications of the same alert.
    pub fanout_min_interval: chrono::Duration,
    /// Unfinished runs older than this are closed as failed.
    pub stale_run_minutes: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::http_from_base(DEFAULT_REGISTRY_BASE_URL),
            fetch_timeout: Duration::from_secs(60),
            sync_workers: 8,
            fanout_concurrency: 4,
            catalog_batch_size: 1000,
            snapshot_dir: None,
            classification: ClassificationPolicy::default(),
            change_detection: ChangeDetectionStrategy::Stateful,
            fanout_min_interval: chrono::Duration::zero(),
            stale_run_minutes: 60,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} has an invalid value '{raw}'"))),
        _ => Ok(default),
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn min_interval_from_secs(secs: i64) -> Result<chrono::Duration, CoreError> {
    if secs < 0 {
        return Err(CoreError::Validation(format!(
            "FANOUT_MIN_INTERVAL_SECS must not be negative, got {secs}"
        )));
    }
    chrono::Duration::try_seconds(secs).ok_or_else(|| {
        CoreError::Validation(format!("FANOUT_MIN_INTERVAL_SECS is out of range: {secs}"))
    })
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                        | Default                         |
    /// |--------------------------------|---------------------------------|
    /// | `REGISTRY_DIR`                 | unset (download over HTTP)      |
    /// | `REGISTRY_BASE_URL`            | regulator download endpoint     |
    /// | `REGISTRY_<FILE>_URL`          | base URL + regulator file name  |
    /// | `FETCH_TIMEOUT_SECS`           | `60`                            |
    /// | `SYNC_WORKERS`                 | `8`                             |
    /// | `FANOUT_CONCURRENCY`           | `4`                             |
    /// | `CATALOG_BATCH_SIZE`           | `1000`                          |
    /// | `SNAPSHOT_DIR`                 | unset (no snapshots)            |
    /// | `UNRECOGNIZED_SHORTAGE_STATUS` | `TENSION`                       |
    /// | `CHANGE_DETECTION`             | `stateful`                      |
    /// | `FANOUT_MIN_INTERVAL_SECS`     | `0` (no throttling)             |
    /// | `STALE_RUN_MINUTES`            | `60`                            |
    ///
    /// `<FILE>` is one of `CATALOG`, `COMPOSITION`, `SHORTAGE`,
    /// `GENERIC_GROUPS`.
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let source = match env_opt("REGISTRY_DIR") {
            Some(dir) => SourceConfig::Directory(PathBuf::from(dir)),
            None => {
                let base = env_opt("REGISTRY_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_REGISTRY_BASE_URL.to_string());
                let mut source = SourceConfig::http_from_base(&base);
                if let SourceConfig::Http { urls } = &mut source {
                    for (file, url) in urls.iter_mut() {
                        let var = format!("REGISTRY_{}_URL", file.as_str().to_uppercase());
                        if let Some(custom) = env_opt(&var) {
                            *url = custom;
                        }
                    }
                }
                source
            }
        };

        let classification = match env_opt("UNRECOGNIZED_SHORTAGE_STATUS") {
            Some(name) => ClassificationPolicy::with_fallback(&name)?,
            None => defaults.classification,
        };
        let change_detection = match env_opt("CHANGE_DETECTION") {
            Some(name) => ChangeDetectionStrategy::from_str(&name)?,
            None => defaults.change_detection,
        };

        let sync_workers: usize = env_or("SYNC_WORKERS", defaults.sync_workers)?;
        let fanout_concurrency: usize =
            env_or("FANOUT_CONCURRENCY", defaults.fanout_concurrency)?;
        let catalog_batch_size: usize =
            env_or("CATALOG_BATCH_SIZE", defaults.catalog_batch_size)?;

        Ok(Self {
            source,
            fetch_timeout: Duration::from_secs(env_or("FETCH_TIMEOUT_SECS", 60u64)?),
            sync_workers: sync_workers.max(1),
            fanout_concurrency: fanout_concurrency.max(1),
            catalog_batch_size: catalog_batch_size.max(1),
            snapshot_dir: env_opt("SNAPSHOT_DIR").map(PathBuf::from),
            classification,
            change_detection,
            fanout_min_interval: min_interval_from_secs(env_or(
                "FANOUT_MIN_INTERVAL_SECS",
                0i64,
            )?)?,
            stale_run_minutes: env_or("STALE_RUN_MINUTES", defaults.stale_run_minutes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn http_urls_use_regulator_file_names() {
        let SourceConfig::Http { urls } = SourceConfig::http_from_base("https://x/?f=") else {
            panic!("expected http source");
        };
        assert_eq!(urls.len(), 4);
        assert_eq!(urls[&RegistryFile::Shortage], "https://x/?f=CIS_CIP_Dispo_Spec.txt");
    }

    #[test]
    fn min_interval_rejects_out_of_range_seconds() {
        assert_eq!(
            min_interval_from_secs(90).unwrap(),
            chrono::Duration::seconds(90)
        );
        assert_matches!(min_interval_from_secs(i64::MAX), Err(CoreError::Validation(_)));
        assert_matches!(min_interval_from_secs(-1), Err(CoreError::Validation(_)));
    }

    #[test]
    fn defaults_are_stateful_and_unthrottled() {
        let config = SyncConfig::default();
        assert_eq!(config.change_detection, ChangeDetectionStrategy::Stateful);
        assert_eq!(config.fanout_min_interval, chrono::Duration::zero());
        assert_eq!(config.sync_workers, 8);
    }
}
