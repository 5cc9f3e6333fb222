use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::pipeline::{PhenotypeStatus, ProgressEvent, ProgressSink, RunReport};
use crate::prefetch::{PrefetchAction, PrefetchReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_prefetch(result: &PrefetchReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn write_run<W: Write>(mut out: W, report: &RunReport) -> io::Result<()> {
        writeln!(out, "PheWAS {} at {}", report.name, report.region)?;
        writeln!(
            out,
            "  phenotypes: {} attempted, {} succeeded, {} skipped",
            report.attempted, report.succeeded, report.skipped
        )?;
        for outcome in &report.outcomes {
            if let PhenotypeStatus::Skipped { reason } = &outcome.status {
                writeln!(out, "  skipped {}: {reason}", outcome.phenocode)?;
            }
        }
        for dropped in &report.dropped {
            writeln!(
                out,
                "  dropped {} rows of {} (not in manifest)",
                dropped.rows, dropped.phenocode
            )?;
        }
        writeln!(
            out,
            "  combined: {} rows -> {}",
            report.combined_rows, report.combined_path
        )
    }

    pub fn write_prefetch<W: Write>(mut out: W, report: &PrefetchReport) -> io::Result<()> {
        writeln!(
            out,
            "index prefetch: {} downloaded, {} present, {} without link, {} failed",
            report.count(PrefetchAction::Downloaded),
            report.count(PrefetchAction::Present),
            report.count(PrefetchAction::NoIndexLink),
            report.count(PrefetchAction::Failed)
        )?;
        for item in &report.items {
            if let Some(error) = &item.error {
                writeln!(out, "  failed {}: {error}", item.phenocode)?;
            }
        }
        Ok(())
    }
}

/// Forwards progress events to the log.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}", event.message
            ),
            None => info!("{}", event.message),
        }
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DroppedPhenotype;
    use crate::pipeline::PhenotypeOutcome;

    #[test]
    fn human_summary_lists_skips_and_drops() {
        let report = RunReport {
            name: "C9ORF72".to_string(),
            region: "9:1-2".to_string(),
            window: 0,
            started_at: String::new(),
            finished_at: String::new(),
            attempted: 2,
            succeeded: 1,
            skipped: 1,
            outcomes: vec![
                PhenotypeOutcome {
                    phenocode: "P1".to_string(),
                    status: PhenotypeStatus::Skipped {
                        reason: "request failed: reset".to_string(),
                    },
                },
                PhenotypeOutcome {
                    phenocode: "P2".to_string(),
                    status: PhenotypeStatus::Succeeded { rows: 2 },
                },
            ],
            dropped: vec![DroppedPhenotype {
                phenocode: "P9".to_string(),
                rows: 4,
            }],
            combined_rows: 2,
            combined_path: "out/C9ORF72_phewas.tab".to_string(),
        };
        let mut out = Vec::new();
        HumanOutput::write_run(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2 attempted, 1 succeeded, 1 skipped"));
        assert!(text.contains("skipped P1: request failed: reset"));
        assert!(text.contains("dropped 4 rows of P9"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "skipped");
        assert_eq!(json["outcomes"][1]["rows"], 2);
    }
}
