use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown text encoding: {0}")]
    UnknownEncoding(String),
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("failed to parse CSV")]
    Csv(#[from] csv::Error),
    #[error("line {line}: unparseable OCCURRED_ON_DATE {value:?}")]
    InvalidDate { line: u64, value: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open database {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("database error")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("query failed for {report}")]
    Query {
        report: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("{0}: no incidents to aggregate")]
    EmptyDataset(&'static str),
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode manifest")]
    Json(#[from] serde_json::Error),
}

/// Any failure that aborts a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("load failed")]
    Load(#[from] LoadError),
    #[error("persist failed")]
    Store(#[from] StoreError),
    #[error("reporting failed")]
    Report(#[from] ReportError),
}
