use crate::error::{AnalysisError, Result};
use crate::stats::{fit_line, Ema, LineFit};
use std::path::{Path, PathBuf};

const DELIMITER: u8 = b';';

/// A recorded calibration run: host seconds against RTC seconds.
#[derive(Debug, Clone)]
pub struct Trial {
    pub label: String,
    pub path: PathBuf,
    pub actual: Vec<f64>,
    pub measured: Vec<f64>,
}

impl Trial {
    pub fn load(path: impl AsRef<Path>, label: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path, label)
    }

    pub fn parse(text: &str, path: impl AsRef<Path>, label: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut actual = Vec::new();
        let mut measured = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| AnalysisError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            let (Some(a), Some(m)) = (record.get(0), record.get(1)) else {
                return Err(AnalysisError::TooFewColumns {
                    path: path.to_path_buf(),
                    line,
                });
            };
            actual.push(parse_cell(a, path, line)?);
            measured.push(parse_cell(m, path, line)?);
        }

        if actual.is_empty() {
            return Err(AnalysisError::Empty { path: path.to_path_buf() });
        }
        log::debug!("{}: {} samples", path.display(), actual.len());

        Ok(Self {
            label: label.into(),
            path: path.to_path_buf(),
            actual,
            measured,
        })
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    pub fn analyze(&self, alpha: f64) -> Result<TrialAnalysis> {
        let delta: Vec<f64> = self
            .measured
            .iter()
            .zip(&self.actual)
            .map(|(m, a)| m - a)
            .collect();
        let ema = Ema::smooth(&delta, alpha);
        let fit = fit_line(&self.actual, &ema).ok_or_else(|| AnalysisError::Degenerate {
            label: self.label.clone(),
        })?;

        let x_min = self.actual.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = self.actual.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(TrialAnalysis {
            label: self.label.clone(),
            actual: self.actual.clone(),
            delta,
            ema,
            fit,
            span: (x_min, x_max),
        })
    }
}

fn parse_cell(cell: &str, path: &Path, line: usize) -> Result<f64> {
    cell.parse().map_err(|_| AnalysisError::NotANumber {
        path: path.to_path_buf(),
        line,
        value: cell.to_string(),
    })
}

/// Delta series, their smoothing and the drift fit for one trial.
#[derive(Debug, Clone)]
pub struct TrialAnalysis {
    pub label: String,
    pub actual: Vec<f64>,
    pub delta: Vec<f64>,
    pub ema: Vec<f64>,
    pub fit: LineFit,
    /// x extent of the data; the regression segment is drawn over it.
    pub span: (f64, f64),
}

impl TrialAnalysis {
    pub fn ppm(&self) -> f64 {
        self.fit.ppm()
    }

    pub fn ppm_label(&self) -> String {
        format!("{:+.1}ppm", self.ppm())
    }

    pub fn regression_segment(&self) -> [(f64, f64); 2] {
        let (x0, x1) = self.span;
        [(x0, self.fit.eval(x0)), (x1, self.fit.eval(x1))]
    }
}
