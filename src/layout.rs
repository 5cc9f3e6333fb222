use std::fs;
use std::io::{self, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::{LocusName, Phenocode};
use crate::error::PhewasError;

/// Deterministic artifact paths for one locus under an output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: Utf8PathBuf,
    name: LocusName,
}

impl OutputLayout {
    pub fn new(root: Utf8PathBuf, name: LocusName) -> Self {
        Self { root, name }
    }

    pub fn locus_dir(&self) -> Utf8PathBuf {
        self.root.join(self.name.as_str())
    }

    /// `{root}/{name}/{phenocode}_{name}.tab`
    pub fn raw_table_path(&self, phenocode: &Phenocode) -> Utf8PathBuf {
        self.locus_dir()
            .join(format!("{}_{}.tab", file_component(phenocode), self.name))
    }

    /// `{root}/{name}/{phenocode}_{name}_withinfo.tab`
    pub fn tagged_table_path(&self, phenocode: &Phenocode) -> Utf8PathBuf {
        self.locus_dir().join(format!(
            "{}_{}_withinfo.tab",
            file_component(phenocode),
            self.name
        ))
    }

    /// `{root}/{name}_phewas.tab`
    pub fn combined_path(&self) -> Utf8PathBuf {
        self.root.join(format!("{}_phewas.tab", self.name))
    }

    /// Idempotent; safe to call from every worker.
    pub fn ensure_dirs(&self) -> Result<(), PhewasError> {
        fs::create_dir_all(self.locus_dir().as_std_path())
            .map_err(|err| PhewasError::Filesystem(format!("create {}: {err}", self.locus_dir())))
    }

    /// Writes through a temporary sibling file and renames it over `path`,
    /// so readers never observe a half-written artifact.
    pub fn write_atomic<F>(path: &Utf8Path, write: F) -> Result<(), PhewasError>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        let parent = path
            .parent()
            .ok_or_else(|| PhewasError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PhewasError::Filesystem(err.to_string()))?;
        let temp = Builder::new()
            .prefix(".panukb-phewas")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PhewasError::Filesystem(err.to_string()))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            write(&mut writer).map_err(|err| PhewasError::Filesystem(format!("{path}: {err}")))?;
            writer
                .flush()
                .map_err(|err| PhewasError::Filesystem(format!("{path}: {err}")))?;
        }
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| PhewasError::Filesystem(err.to_string()))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| PhewasError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Percent-escapes path separators. `%` is escaped too, so distinct
/// phenocodes never share an artifact path.
fn file_component(phenocode: &Phenocode) -> String {
    let mut out = String::with_capacity(phenocode.as_str().len());
    for ch in phenocode.as_str().chars() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            _ => out.push(ch),
        }
    }
    out
}
