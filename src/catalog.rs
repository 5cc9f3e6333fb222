use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Phenocode;
use crate::error::PhewasError;

/// One row of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub phenocode: Phenocode,
    #[serde(rename = "aws_link")]
    pub remote_link: String,
    #[serde(rename = "aws_link_tabix", default, deserialize_with = "empty_as_none")]
    pub index_link: Option<String>,
    pub trait_type: String,
    #[serde(default)]
    pub description: String,
}

impl CatalogEntry {
    pub fn new(
        phenocode: Phenocode,
        remote_link: impl Into<String>,
        trait_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            phenocode,
            remote_link: remote_link.into(),
            index_link: None,
            trait_type: trait_type.into(),
            description: description.into(),
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

/// Ordered, phenocode-unique collection of manifest entries.
#[derive(Debug, Clone)]
pub struct PhenotypeCatalog {
    entries: Vec<CatalogEntry>,
    positions: HashMap<Phenocode, usize>,
}

impl PhenotypeCatalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, PhewasError> {
        if entries.is_empty() {
            return Err(PhewasError::EmptyCatalog);
        }
        let mut positions = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if positions.insert(entry.phenocode.clone(), idx).is_some() {
                return Err(PhewasError::DuplicatePhenocode(
                    entry.phenocode.to_string(),
                ));
            }
        }
        Ok(Self { entries, positions })
    }

    pub fn from_path(path: &Path) -> Result<Self, PhewasError> {
        let file =
            File::open(path).map_err(|_| PhewasError::ManifestRead(path.to_path_buf()))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PhewasError> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
        let entries = csv
            .deserialize::<CatalogEntry>()
            .enumerate()
            .map(|(idx, record)| {
                record.map_err(|err| {
                    PhewasError::ManifestParse(format!("record {}: {err}", idx + 1))
                })
            })
            .collect::<Result<Vec<_>, PhewasError>>()?;
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, phenocode: &Phenocode) -> Option<&CatalogEntry> {
        self.positions.get(phenocode).map(|idx| &self.entries[*idx])
    }

    /// Catalog position of a phenocode, used to order combined output.
    pub fn position(&self, phenocode: &Phenocode) -> Option<usize> {
        self.positions.get(phenocode).copied()
    }

    /// The first `limit` entries, or all of them when `limit` is `None`.
    pub fn take(&self, limit: Option<usize>) -> &[CatalogEntry] {
        match limit {
            Some(limit) => &self.entries[..limit.min(self.entries.len())],
            None => &self.entries,
        }
    }
}
