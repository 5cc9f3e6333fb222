use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogEntry, PhenotypeCatalog};
use crate::error::PhewasError;
use crate::pipeline::{ProgressEvent, ProgressSink};
use crate::remote::RemoteFiles;

#[derive(Debug, Clone)]
pub struct PrefetchOptions {
    pub dest: PathBuf,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchAction {
    Downloaded,
    Present,
    NoIndexLink,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefetchItem {
    pub phenocode: String,
    pub action: PrefetchAction,
    pub path: Option<String>,
    pub bytes: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefetchReport {
    pub items: Vec<PrefetchItem>,
}

impl PrefetchReport {
    pub fn count(&self, action: PrefetchAction) -> usize {
        self.items.iter().filter(|item| item.action == action).count()
    }

    /// True when at least one download was attempted and none succeeded.
    pub fn all_failed(&self) -> bool {
        let failed = self.count(PrefetchAction::Failed);
        failed > 0 && self.count(PrefetchAction::Downloaded) == 0
    }
}

/// Downloads every entry's index file (`aws_link_tabix`) into `options.dest`.
pub fn prefetch_indexes<F: RemoteFiles>(
    files: &F,
    catalog: &PhenotypeCatalog,
    options: &PrefetchOptions,
    sink: &dyn ProgressSink,
) -> Result<PrefetchReport, PhewasError> {
    fs::create_dir_all(&options.dest).map_err(|err| {
        PhewasError::Filesystem(format!("create {}: {err}", options.dest.display()))
    })?;

    let mut items = Vec::with_capacity(catalog.len());
    for entry in catalog.entries() {
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; index for {}", entry.phenocode),
            elapsed: None,
        });
        items.push(prefetch_one(files, entry, options));
    }

    let report = PrefetchReport { items };
    info!(
        downloaded = report.count(PrefetchAction::Downloaded),
        present = report.count(PrefetchAction::Present),
        failed = report.count(PrefetchAction::Failed),
        "prefetch complete"
    );
    Ok(report)
}

fn prefetch_one<F: RemoteFiles>(
    files: &F,
    entry: &CatalogEntry,
    options: &PrefetchOptions,
) -> PrefetchItem {
    let mut item = PrefetchItem {
        phenocode: entry.phenocode.to_string(),
        action: PrefetchAction::NoIndexLink,
        path: None,
        bytes: None,
        error: None,
    };
    let Some(url) = entry.index_link.as_deref() else {
        return item;
    };
    let Some(file_name) = file_name_from_url(url) else {
        item.action = PrefetchAction::Failed;
        item.error = Some(format!("cannot derive a file name from {url}"));
        return item;
    };

    let destination = options.dest.join(file_name);
    item.path = Some(destination.display().to_string());
    if !options.force && destination.exists() {
        item.action = PrefetchAction::Present;
        return item;
    }

    match download_atomic(files, url, &destination) {
        Ok(bytes) => {
            item.action = PrefetchAction::Downloaded;
            item.bytes = Some(bytes);
        }
        Err(err) => {
            warn!(phenocode = %entry.phenocode, error = %err, "index download failed");
            item.action = PrefetchAction::Failed;
            item.error = Some(err.to_string());
        }
    }
    item
}

fn download_atomic<F: RemoteFiles>(
    files: &F,
    url: &str,
    destination: &Path,
) -> Result<u64, PhewasError> {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    let bytes = match files.download(url, &partial) {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
    };
    fs::rename(&partial, destination).map_err(|err| PhewasError::Filesystem(err.to_string()))?;
    Ok(bytes)
}

/// Last path segment of `url`, ignoring any query string or fragment.
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (_, name) = path.rsplit_once('/')?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name)
}
