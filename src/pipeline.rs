use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{DroppedPhenotype, aggregate};
use crate::catalog::{CatalogEntry, PhenotypeCatalog};
use crate::config::RunConfig;
use crate::domain::Locus;
use crate::error::PhewasError;
use crate::extract::{RangeExtractor, RangeSource};
use crate::layout::OutputLayout;
use crate::table::{TaggedTable, tag};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

/// Receives coarse progress from every worker; implementations must be shareable.
pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhenotypeStatus {
    Succeeded { rows: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PhenotypeOutcome {
    pub phenocode: String,
    #[serde(flatten)]
    pub status: PhenotypeStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    pub region: String,
    pub window: i64,
    pub started_at: String,
    pub finished_at: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub outcomes: Vec<PhenotypeOutcome>,
    pub dropped: Vec<DroppedPhenotype>,
    pub combined_rows: usize,
    pub combined_path: String,
}

impl RunReport {
    pub fn skipped_phenocodes(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|outcome| match outcome.status {
            PhenotypeStatus::Skipped { .. } => Some(outcome.phenocode.as_str()),
            PhenotypeStatus::Succeeded { .. } => None,
        })
    }
}

pub struct Pipeline<S: RangeSource> {
    source: S,
}

impl<S: RangeSource> Pipeline<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Extracts and tags every selected phenotype, then writes the combined table.
    ///
    /// Phenotype-scoped failures are recorded as skips; the run fails only on
    /// a structural error or when no phenotype succeeds, and in that case no
    /// combined artifact is written.
    pub fn run(
        &self,
        config: &RunConfig,
        catalog: &PhenotypeCatalog,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, PhewasError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let started = Instant::now();
        let layout = OutputLayout::new(config.outdir.clone(), config.name.clone());
        layout.ensure_dirs()?;

        let entries = catalog.take(config.limit);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; locus {} ({}), {} phenotypes",
                config.locus,
                config.name,
                entries.len()
            ),
            elapsed: None,
        });
        if config.locus.start < 0 {
            warn!(
                region = %config.locus,
                "window extends below position 0; passing the region through unclamped"
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.settings.workers())
            .thread_name(|idx| format!("phewas-worker-{idx}"))
            .build()
            .map_err(|err| PhewasError::WorkerPool(err.to_string()))?;

        let results = pool.install(|| {
            entries
                .par_iter()
                .map(|entry| match self.process(entry, &config.locus, &layout, sink) {
                    Err(err) if !err.is_phenotype_scoped() => Err(err),
                    other => Ok(other),
                })
                .collect::<Result<Vec<_>, PhewasError>>()
        })?;

        let mut outcomes = Vec::with_capacity(entries.len());
        let mut tables = Vec::with_capacity(entries.len());
        for (entry, result) in entries.iter().zip(results) {
            match result {
                Ok(table) => {
                    outcomes.push(PhenotypeOutcome {
                        phenocode: entry.phenocode.to_string(),
                        status: PhenotypeStatus::Succeeded {
                            rows: table.row_count(),
                        },
                    });
                    tables.push(table);
                }
                Err(err) => {
                    warn!(phenocode = %entry.phenocode, error = %err, "skipping phenotype");
                    outcomes.push(PhenotypeOutcome {
                        phenocode: entry.phenocode.to_string(),
                        status: PhenotypeStatus::Skipped {
                            reason: err.to_string(),
                        },
                    });
                }
            }
        }

        let attempted = entries.len();
        let succeeded = tables.len();
        if succeeded == 0 {
            return Err(PhewasError::ZeroSuccesses { attempted });
        }

        let combined_path = layout.combined_path();
        sink.event(ProgressEvent {
            message: format!("phase=Aggregate; combining {succeeded} phenotypes to {combined_path}"),
            elapsed: Some(started.elapsed()),
        });
        let aggregation = aggregate(&tables, catalog);
        OutputLayout::write_atomic(&combined_path, |writer| aggregation.table.write_tsv(writer))?;
        if !aggregation.dropped.is_empty() {
            warn!(
                phenotypes = aggregation.dropped.len(),
                rows = aggregation.dropped_rows(),
                "rows dropped by catalog join"
            );
        }
        info!(
            succeeded,
            skipped = attempted - succeeded,
            rows = aggregation.table.row_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "phewas complete"
        );
        sink.event(ProgressEvent {
            message: "phase=Store; combined table written".to_string(),
            elapsed: Some(started.elapsed()),
        });

        Ok(RunReport {
            name: config.name.to_string(),
            region: config.locus.region(),
            window: config.locus.window,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            attempted,
            succeeded,
            skipped: attempted - succeeded,
            outcomes,
            dropped: aggregation.dropped,
            combined_rows: aggregation.table.row_count(),
            combined_path: combined_path.to_string(),
        })
    }

    fn process(
        &self,
        entry: &CatalogEntry,
        locus: &Locus,
        layout: &OutputLayout,
        sink: &dyn ProgressSink,
    ) -> Result<TaggedTable, PhewasError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {}", entry.phenocode),
            elapsed: None,
        });

        let extracted = RangeExtractor::new(&self.source, layout).extract(entry, locus)?;
        let tagged = tag(extracted, &entry.phenocode);
        let tagged_path = layout.tagged_table_path(&entry.phenocode);
        OutputLayout::write_atomic(&tagged_path, |writer| tagged.write_tsv(writer))?;

        info!(
            phenocode = %entry.phenocode,
            rows = tagged.row_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "phenotype extracted"
        );
        sink.event(ProgressEvent {
            message: format!("phase=Tag; {} ({} rows)", entry.phenocode, tagged.row_count()),
            elapsed: Some(started.elapsed()),
        });
        Ok(tagged)
    }
}
