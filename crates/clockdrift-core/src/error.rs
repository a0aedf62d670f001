use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("no serial port selected")]
    NoPort,
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("failed to start serial worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("serial worker is gone")]
    Disconnected,
    #[error("failed to write {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
