//! Chart layouts: which trials go into which panel, and in what colours.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesColors {
    pub raw: String,
    pub ema: String,
    pub poly: String,
}

impl SeriesColors {
    fn new(raw: &str, ema: &str, poly: &str) -> Self {
        Self {
            raw: raw.into(),
            ema: ema.into(),
            poly: poly.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub file: PathBuf,
    pub label: String,
    pub colors: SeriesColors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Panel {
    /// A single uncompensated trial.
    Bare { trial: TrialSpec },
    /// Two trials of one capacitor value, with the band between their fits shaded.
    Group {
        label: String,
        fill: String,
        trials: [TrialSpec; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartLayout {
    #[serde(default = "default_x_range")]
    pub x_range: [f64; 2],
    #[serde(default = "default_padding")]
    pub padding: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_columns")]
    pub columns: usize,
    #[serde(default = "default_panel_size")]
    pub panel_size: [f64; 2],
    pub panels: Vec<Panel>,
}

fn default_x_range() -> [f64; 2] {
    [0.0, 600.0]
}

fn default_padding() -> f64 {
    0.05
}

fn default_alpha() -> f64 {
    crate::session::DEFAULT_ALPHA
}

fn default_columns() -> usize {
    2
}

fn default_panel_size() -> [f64; 2] {
    [500.0, 300.0]
}

impl ChartLayout {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut layout: Self = serde_json::from_str(&text).map_err(|source| AnalysisError::Layout {
            path: path.to_path_buf(),
            source,
        })?;

        // Trial files are relative to the layout file.
        if let Some(base) = path.parent() {
            for spec in layout.trial_specs_mut() {
                if spec.file.is_relative() {
                    spec.file = base.join(&spec.file);
                }
            }
        }
        Ok(layout)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    fn trial_specs_mut(&mut self) -> impl Iterator<Item = &mut TrialSpec> {
        self.panels.iter_mut().flat_map(|panel| match panel {
            Panel::Bare { trial } => std::slice::from_mut(trial).iter_mut(),
            Panel::Group { trials, .. } => trials.iter_mut(),
        })
    }

    /// The bare crystal plus 5.1, 10 and 22 pF load capacitors, each measured
    /// with the trimmer at both ends of its 5/20 pF travel.
    pub fn default_for(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let spec = |file: &str, label: &str, colors: SeriesColors| TrialSpec {
            file: dir.join(file),
            label: label.into(),
            colors,
        };
        let group = |cap: &str, fill: &str, low: SeriesColors, high: SeriesColors| Panel::Group {
            label: format!("{cap}+(5/20)"),
            fill: fill.into(),
            trials: [
                spec(&format!("{cap}+(_5-20).csv"), &format!("{cap}+(_5/20)"), low),
                spec(&format!("{cap}+(5-_20).csv"), &format!("{cap}+(5/_20)"), high),
            ],
        };

        Self {
            x_range: default_x_range(),
            padding: default_padding(),
            alpha: default_alpha(),
            columns: default_columns(),
            panel_size: default_panel_size(),
            panels: vec![
                Panel::Bare {
                    trial: spec("bare.csv", "Bare", SeriesColors::new("#1E90FF", "#87CEEB", "#104E8B")),
                },
                group(
                    "5.1",
                    "#FF6347",
                    SeriesColors::new("#FF4500", "#FF8C69", "#8B2500"),
                    SeriesColors::new("#32CD32", "#90EE90", "#228B22"),
                ),
                group(
                    "10",
                    "#FF82AB",
                    SeriesColors::new("#FF1493", "#FF69B4", "#8B008B"),
                    SeriesColors::new("#FFD700", "#FFEC8B", "#8B7500"),
                ),
                group(
                    "22",
                    "#6A5ACD",
                    SeriesColors::new("#00CED1", "#48D1CC", "#00868B"),
                    SeriesColors::new("#9400D3", "#C71585", "#4B0082"),
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_four_panels() {
        let layout = ChartLayout::default_for("resources");
        assert_eq!(layout.panels.len(), 4);
        let Panel::Group { label, trials, .. } = &layout.panels[2] else {
            panic!("expected a group");
        };
        assert_eq!(label, "10+(5/20)");
        assert_eq!(trials[0].file, Path::new("resources").join("10+(_5-20).csv"));
        assert_eq!(trials[1].label, "10+(5/_20)");
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let json = r##"{
            "panels": [
                { "kind": "bare", "trial": { "file": "a.csv", "label": "A",
                  "colors": { "raw": "#111", "ema": "#222", "poly": "#333" } } }
            ]
        }"##;
        let layout: ChartLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.x_range, [0.0, 600.0]);
        assert_eq!(layout.columns, 2);
        assert_eq!(layout.panels.len(), 1);
    }
}
