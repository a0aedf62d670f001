use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "clockdrift";
const FILE_NAME: &str = "settings.json";

/// Remembered between runs so the monitor reopens on the last port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub alpha: f64,
    pub dtr: bool,
    /// Default directory for `--record` paths that are not absolute.
    pub record_dir: Option<PathBuf>,
    pub max_log_lines: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9_600,
            alpha: clockdrift_analysis::DEFAULT_ALPHA,
            dtr: true,
            record_dir: None,
            max_log_lines: 10_000,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
    }

    /// Missing or unreadable settings are not fatal; defaults are used.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("ignoring corrupt settings {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("cannot read settings {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!("saved settings to {}", path.display());
        Ok(())
    }

    pub fn resolve_record_path(&self, path: &Path) -> PathBuf {
        match &self.record_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
