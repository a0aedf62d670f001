//! Live chart geometry for the monitor window. Paths are expressed in a fixed
//! viewbox that the window's `Path` elements stretch to fit.

use clockdrift_analysis::{padded_range, polyline_commands, DriftSession, Viewport};

pub const VIEW_WIDTH: f64 = 1000.0;
pub const VIEW_HEIGHT: f64 = 500.0;
const PADDING: f64 = 0.05;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LivePaths {
    pub raw: String,
    pub ema: String,
    pub fit: String,
    pub zero: String,
    pub x_max: f64,
    pub y_range: (f64, f64),
}

pub fn live_paths(session: &DriftSession) -> LivePaths {
    let actual = session.actual();
    if actual.is_empty() {
        return LivePaths::default();
    }

    let x_max = actual.iter().copied().fold(1.0, f64::max);
    let fit = session.fit();
    let mut ys: Vec<f64> = session.delta().iter().chain(session.smoothed()).copied().collect();
    if let Some(fit) = fit {
        ys.extend([fit.eval(actual[0]), fit.eval(x_max)]);
    }
    let y_range = padded_range(&ys, PADDING).unwrap_or((-1.0, 1.0));
    let vp = Viewport::new((0.0, x_max), y_range, 0.0, 0.0, VIEW_WIDTH, VIEW_HEIGHT);

    let series = |ys: &[f64]| polyline_commands(actual.iter().copied().zip(ys.iter().copied()), &vp);
    let fit_path = fit
        .map(|f| {
            let x0 = actual[0];
            polyline_commands([(x0, f.eval(x0)), (x_max, f.eval(x_max))], &vp)
        })
        .unwrap_or_default();
    let zero = if y_range.0 <= 0.0 && 0.0 <= y_range.1 {
        polyline_commands([(0.0, 0.0), (x_max, 0.0)], &vp)
    } else {
        String::new()
    };

    LivePaths {
        raw: series(session.delta()),
        ema: series(session.smoothed()),
        fit: fit_path,
        zero,
        x_max,
        y_range,
    }
}
