pub mod cache;
pub mod csv;
pub mod demo;

use std::path::PathBuf;

use thiserror::Error;

/// Structural ingest failures. Data-quality problems (missing values,
/// unmatched keys, absent optional columns) never surface here; they are
/// coerced or reported as warnings on the snapshot instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("required table {0} is empty or missing")]
    EmptyTable(&'static str),
    #[error("failed reading {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing CSV {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },
}
