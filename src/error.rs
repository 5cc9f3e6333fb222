use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PhewasError {
    #[error("malformed locus {0:?} (expected chrom:start-end)")]
    #[diagnostic(help("bounds may be separated by '-' or ':', e.g. 9:27573483-27573544"))]
    MalformedLocus(String),

    #[error("invalid window size: {0}")]
    InvalidWindow(i64),

    #[error("invalid locus name: {0:?}")]
    InvalidName(String),

    #[error("failed to read manifest at {0}")]
    ManifestRead(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    #[error("duplicate phenocode in manifest: {0}")]
    DuplicatePhenocode(String),

    #[error("manifest contains no phenotypes")]
    EmptyCatalog,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("request failed: {0}")]
    FetchHttp(String),

    #[error("remote returned status {status}: {message}")]
    FetchStatus { status: u16, message: String },

    #[error("range query timed out after {0}s")]
    FetchTimeout(u64),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("index directory {0} is unusable: {1}")]
    #[diagnostic(help("set index_dir in the settings file to a writable directory"))]
    IndexDir(PathBuf, String),

    #[error("range query failed: {0}")]
    RangeQuery(String),

    #[error("remote resource has an empty header line")]
    EmptyHeader,

    #[error(
        "schema mismatch for {phenocode}: line {line} has {found} fields, header has {expected}"
    )]
    SchemaMismatch {
        phenocode: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("no phenotype produced usable data ({attempted} attempted)")]
    #[diagnostic(help("check network access and that tabix is installed"))]
    ZeroSuccesses { attempted: usize },
}

impl PhewasError {
    /// Errors that only invalidate the phenotype being processed.
    pub fn is_phenotype_scoped(&self) -> bool {
        matches!(
            self,
            PhewasError::FetchHttp(_)
                | PhewasError::FetchStatus { .. }
                | PhewasError::FetchTimeout(_)
                | PhewasError::RangeQuery(_)
                | PhewasError::EmptyHeader
                | PhewasError::SchemaMismatch { .. }
                | PhewasError::Filesystem(_)
        )
    }
}
