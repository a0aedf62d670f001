use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path}:{line}: expected at least two columns")]
    TooFewColumns { path: PathBuf, line: usize },
    #[error("{path}:{line}: {value:?} is not a number")]
    NotANumber { path: PathBuf, line: usize, value: String },
    #[error("{path}: no samples")]
    Empty { path: PathBuf },
    #[error("{label}: cannot fit a line through fewer than two distinct points")]
    Degenerate { label: String },
    #[error("invalid chart layout {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
