use std::io::Write;

use tracing::debug;

use crate::catalog::CatalogEntry;
use crate::domain::Locus;
use crate::error::PhewasError;
use crate::layout::OutputLayout;
use crate::remote::RemoteFiles;
use crate::table::ExtractedTable;
use crate::tabix::RangeQuery;

/// Where a phenotype's header and range rows come from.
pub trait RangeSource: Send + Sync {
    fn header(&self, entry: &CatalogEntry) -> Result<String, PhewasError>;
    fn rows(&self, entry: &CatalogEntry, region: &str) -> Result<Vec<String>, PhewasError>;
}

/// Header over HTTP, rows through an indexed range query.
pub struct RemoteTabixSource<F: RemoteFiles, Q: RangeQuery> {
    files: F,
    query: Q,
}

impl<F: RemoteFiles, Q: RangeQuery> RemoteTabixSource<F, Q> {
    pub fn new(files: F, query: Q) -> Self {
        Self { files, query }
    }
}

impl<F: RemoteFiles, Q: RangeQuery> RangeSource for RemoteTabixSource<F, Q> {
    fn header(&self, entry: &CatalogEntry) -> Result<String, PhewasError> {
        self.files.header_line(&entry.remote_link)
    }

    fn rows(&self, entry: &CatalogEntry, region: &str) -> Result<Vec<String>, PhewasError> {
        self.query.query(&entry.remote_link, region)
    }
}

pub struct RangeExtractor<'a, S: RangeSource> {
    source: &'a S,
    layout: &'a OutputLayout,
}

impl<'a, S: RangeSource> RangeExtractor<'a, S> {
    pub fn new(source: &'a S, layout: &'a OutputLayout) -> Self {
        Self { source, layout }
    }

    /// Fetches header and range rows, writes them verbatim to the raw artifact,
    /// then validates every row against the header width.
    ///
    /// The raw artifact is written before validation so a phenotype rejected
    /// for schema drift can still be inspected.
    pub fn extract(
        &self,
        entry: &CatalogEntry,
        locus: &Locus,
    ) -> Result<ExtractedTable, PhewasError> {
        let region = locus.region();
        let header = self.source.header(entry)?;
        let rows = self.source.rows(entry, &region)?;
        debug!(
            phenocode = %entry.phenocode,
            region = %region,
            rows = rows.len(),
            "fetched range"
        );

        let raw_path = self.layout.raw_table_path(&entry.phenocode);
        OutputLayout::write_atomic(&raw_path, |writer| {
            writeln!(writer, "{header}")?;
            for row in &rows {
                writeln!(writer, "{row}")?;
            }
            Ok(())
        })?;

        ExtractedTable::from_lines(&entry.phenocode, &header, &rows)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    struct FakeFiles;

    impl RemoteFiles for FakeFiles {
        fn header_line(&self, url: &str) -> Result<String, PhewasError> {
            match url {
                "bad" => Err(PhewasError::FetchStatus {
                    status: 404,
                    message: "missing".to_string(),
                }),
                _ => Ok("chr\tpos\tpval".to_string()),
            }
        }

        fn download(&self, _url: &str, _destination: &Path) -> Result<u64, PhewasError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct FakeQuery {
        regions: Mutex<Vec<String>>,
    }

    impl RangeQuery for FakeQuery {
        fn query(&self, resource: &str, region: &str) -> Result<Vec<String>, PhewasError> {
            self.regions.lock().unwrap().push(region.to_string());
            match resource {
                "drift" => Ok(vec!["9\t100\t0.1".to_string(), "9\t101".to_string()]),
                _ => Ok(vec!["9\t100\t0.1".to_string(), "9\t101\t0.2".to_string()]),
            }
        }
    }

    fn entry(link: &str) -> CatalogEntry {
        CatalogEntry::new("P1".parse().unwrap(), link, "continuous", "desc")
    }

    fn layout(root: &Path) -> OutputLayout {
        let root = Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap();
        OutputLayout::new(root, "LOC".parse().unwrap())
    }

    #[test]
    fn extract_persists_raw_table() {
        let temp = tempfile::tempdir().unwrap();
        let layout = layout(temp.path());
        let source = RemoteTabixSource::new(FakeFiles, FakeQuery::default());
        let extractor = RangeExtractor::new(&source, &layout);
        let locus = Locus::resolve("9:150-160", 100).unwrap();

        let table = extractor.extract(&entry("ok"), &locus).unwrap();
        assert_eq!(table.rows().len(), 2);
        assert_eq!(*source.query.regions.lock().unwrap(), vec!["9:50-260"]);

        let raw = std::fs::read_to_string(
            layout.raw_table_path(&"P1".parse().unwrap()).as_std_path(),
        )
        .unwrap();
        assert_eq!(raw, "chr\tpos\tpval\n9\t100\t0.1\n9\t101\t0.2\n");
    }

    #[test]
    fn extract_rejects_drifted_rows_but_keeps_raw_artifact() {
        let temp = tempfile::tempdir().unwrap();
        let layout = layout(temp.path());
        let source = RemoteTabixSource::new(FakeFiles, FakeQuery::default());
        let extractor = RangeExtractor::new(&source, &layout);
        let locus = Locus::resolve("9:150-160", 0).unwrap();

        assert_matches!(
            extractor.extract(&entry("drift"), &locus),
            Err(PhewasError::SchemaMismatch { line: 2, .. })
        );
        assert!(
            layout
                .raw_table_path(&"P1".parse().unwrap())
                .as_std_path()
                .exists()
        );
    }

    #[test]
    fn extract_surfaces_fetch_failure() {
        let temp = tempfile::tempdir().unwrap();
        let layout = layout(temp.path());
        let source = RemoteTabixSource::new(FakeFiles, FakeQuery::default());
        let extractor = RangeExtractor::new(&source, &layout);
        let locus = Locus::resolve("9:150-160", 0).unwrap();

        assert_matches!(
            extractor.extract(&entry("bad"), &locus),
            Err(PhewasError::FetchStatus { status: 404, .. })
        );
        assert!(source.query.regions.lock().unwrap().is_empty());
    }
}
