use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{Locus, LocusName};
use crate::error::PhewasError;

pub const DEFAULT_CONFIG_FILE: &str = "panukb-phewas.json";

/// Operational knobs; every field has a default so the file is optional.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub max_retries: usize,
    pub tabix_path: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fetch_timeout_secs: 300,
            http_timeout_secs: 60,
            max_retries: 3,
            tabix_path: None,
            index_dir: None,
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Worker count, never below one.
    pub fn workers(&self) -> usize {
        self.concurrency.max(1)
    }
}

pub struct SettingsLoader;

impl SettingsLoader {
    /// Reads `path`, or `panukb-phewas.json` from the working directory when it exists.
    pub fn resolve(path: Option<&str>) -> Result<Settings, PhewasError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PhewasError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Settings, PhewasError> {
        serde_json::from_str(content).map_err(|err| PhewasError::ConfigParse(err.to_string()))
    }
}

/// Everything one pipeline run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub locus: Locus,
    pub name: LocusName,
    pub limit: Option<usize>,
    pub outdir: Utf8PathBuf,
    pub settings: Settings,
}

impl RunConfig {
    pub fn new(
        locus_spec: &str,
        name: &str,
        window: i64,
        numpts: i64,
        outdir: Utf8PathBuf,
        settings: Settings,
    ) -> Result<Self, PhewasError> {
        Ok(Self {
            locus: Locus::resolve(locus_spec, window)?,
            name: name.parse()?,
            limit: limit_from_numpts(numpts),
            outdir,
            settings,
        })
    }
}

/// `--numpts` semantics: a positive count caps the run, anything else means all.
pub fn limit_from_numpts(numpts: i64) -> Option<usize> {
    (numpts > 0).then(|| usize::try_from(numpts).unwrap_or(usize::MAX))
}
