use crate::error::{CoreError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const TRIAL_COLUMNS: [&str; 2] = ["actual", "measured"];

/// Appends `(actual, measured)` pairs to a `;`-separated trial file.
///
/// Rows are flushed as they are written so an interrupted capture still
/// leaves a usable file.
pub struct TrialRecorder {
    path: PathBuf,
    out: csv::Writer<File>,
    rows: usize,
}

impl TrialRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let record_err = |source| CoreError::Record { path: path.clone(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(record_err)?;
        }
        let file = File::create(&path).map_err(record_err)?;
        let mut out = csv::WriterBuilder::new()
            .delimiter(b';')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        out.write_record(TRIAL_COLUMNS)
            .map_err(|source| CoreError::Csv { path: path.clone(), source })?;
        out.flush().map_err(record_err)?;
        log::info!("recording trial to {}", path.display());

        Ok(Self { path, out, rows: 0 })
    }

    pub fn record(&mut self, actual: f64, measured: i64) -> Result<()> {
        self.out
            .write_record([actual.to_string(), measured.to_string()])
            .map_err(|source| CoreError::Csv { path: self.path.clone(), source })?;
        self.out
            .flush()
            .map_err(|source| CoreError::Record { path: self.path.clone(), source })?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
