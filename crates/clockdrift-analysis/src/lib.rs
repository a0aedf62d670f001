//! Drift math, live sessions, recorded trials and comparison charts.

pub mod error;
pub mod stats;
pub mod session;
pub mod trial;
pub mod layout;
pub mod chart;
pub mod svg;

pub use error::{AnalysisError, Result};
pub use stats::{fit_line, millis_per_hour, padded_range, seconds_per_day, Ema, LineFit};
pub use session::{DriftSample, DriftSession, Observation, DEFAULT_ALPHA, TABLE_HEADER};
pub use trial::{Trial, TrialAnalysis};
pub use layout::{ChartLayout, Panel, SeriesColors, TrialSpec};
pub use chart::{band_commands, polyline_commands, Viewport};
pub use svg::render_svg;
