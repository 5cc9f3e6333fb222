use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::catalog::{CatalogEntry, PhenotypeCatalog};
use crate::table::{CombinedTable, PHENOCODE_COLUMN, TaggedTable};

/// Rows discarded because their phenocode is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedPhenotype {
    pub phenocode: String,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub table: CombinedTable,
    pub dropped: Vec<DroppedPhenotype>,
}

impl Aggregation {
    pub fn dropped_rows(&self) -> usize {
        self.dropped.iter().map(|dropped| dropped.rows).sum()
    }
}

/// A column identified by name and by which repeat of that name it is, so a
/// header that repeats a name keeps both columns.
type ColumnKey = (String, usize);

/// Concatenates tagged tables and inner-joins them with catalog metadata.
///
/// Output columns are `phenocode, trait_type, description` followed by the
/// union of extracted columns in first-seen order; a table lacking one of
/// them gets an empty cell. Rows follow catalog order, then extraction order,
/// whatever order `tagged` arrives in.
pub fn aggregate(tagged: &[TaggedTable], catalog: &PhenotypeCatalog) -> Aggregation {
    let mut matched: Vec<(usize, &CatalogEntry, &TaggedTable)> = Vec::new();
    let mut dropped = Vec::new();
    for table in tagged {
        match catalog.position(table.phenocode()) {
            Some(position) => {
                if let Some(entry) = catalog.get(table.phenocode()) {
                    matched.push((position, entry, table));
                }
            }
            None => {
                warn!(
                    phenocode = %table.phenocode(),
                    rows = table.row_count(),
                    "phenocode not in catalog; dropping rows"
                );
                dropped.push(DroppedPhenotype {
                    phenocode: table.phenocode().to_string(),
                    rows: table.row_count(),
                });
            }
        }
    }
    matched.sort_by_key(|(position, _, _)| *position);

    let mut columns: Vec<ColumnKey> = Vec::new();
    let mut column_index: HashMap<ColumnKey, usize> = HashMap::new();
    for (_, _, table) in &matched {
        for key in column_keys(table.data_header()) {
            if !column_index.contains_key(&key) {
                column_index.insert(key.clone(), columns.len());
                columns.push(key);
            }
        }
    }

    let mut header = vec![
        PHENOCODE_COLUMN.to_string(),
        "trait_type".to_string(),
        "description".to_string(),
    ];
    header.extend(columns.iter().map(|(name, _)| name.clone()));

    let mut rows = Vec::with_capacity(matched.iter().map(|(_, _, t)| t.row_count()).sum());
    for (_, entry, table) in &matched {
        let targets = column_keys(table.data_header())
            .map(|key| column_index[&key])
            .collect::<Vec<_>>();
        for row in table.rows() {
            let mut cells = vec![String::new(); columns.len()];
            for (value, target) in row[1..].iter().zip(&targets) {
                cells[*target] = value.clone();
            }
            let mut combined = Vec::with_capacity(header.len());
            combined.push(entry.phenocode.to_string());
            combined.push(entry.trait_type.clone());
            combined.push(entry.description.clone());
            combined.extend(cells);
            rows.push(combined);
        }
    }

    Aggregation {
        table: CombinedTable { header, rows },
        dropped,
    }
}

fn column_keys(header: &[String]) -> impl Iterator<Item = ColumnKey> + '_ {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    header.iter().map(move |name| {
        let count = seen.entry(name.as_str()).or_insert(0);
        let key = (name.clone(), *count);
        *count += 1;
        key
    })
}
