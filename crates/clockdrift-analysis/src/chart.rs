//! Data-to-pixel mapping shared by the SVG writer and the live monitor.

use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    /// Pixel box: left, top, width, height. y grows downwards.
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(x_range: (f64, f64), y_range: (f64, f64), left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            x_range,
            y_range,
            left,
            top,
            width,
            height,
        }
    }

    pub fn px(&self, x: f64) -> f64 {
        let (x0, x1) = self.x_range;
        let span = if x1 == x0 { 1.0 } else { x1 - x0 };
        self.left + (x - x0) / span * self.width
    }

    pub fn py(&self, y: f64) -> f64 {
        let (y0, y1) = self.y_range;
        let span = if y1 == y0 { 1.0 } else { y1 - y0 };
        self.top + self.height - (y - y0) / span * self.height
    }

    pub fn map(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (self.px(x), self.py(y))
    }

    /// Evenly spaced tick values across `range`, at most `max_ticks` of them,
    /// on a 1/2/5 step.
    pub fn ticks(range: (f64, f64), max_ticks: usize) -> Vec<f64> {
        let (lo, hi) = range;
        let span = hi - lo;
        if !span.is_finite() || span <= 0.0 || max_ticks == 0 {
            return Vec::new();
        }
        let raw = span / max_ticks as f64;
        let mag = 10f64.powf(raw.log10().floor());
        let step = [1.0, 2.0, 5.0, 10.0]
            .iter()
            .map(|m| m * mag)
            .find(|s| span / s <= max_ticks as f64 + 1e-9)
            .unwrap_or(10.0 * mag);

        let first = (lo / step).ceil();
        let last = (hi / step + 1e-9).floor();
        if last < first {
            return Vec::new();
        }
        // Step count is bounded by max_ticks even when `lo + step == lo`.
        let count = ((last - first) as usize).min(max_ticks) + 1;
        (0..count)
            .map(|k| {
                let t = (first + k as f64) * step;
                // Snap -0.0 and float dust to clean values.
                if t.abs() < step * 1e-9 {
                    0.0
                } else {
                    t
                }
            })
            .collect()
    }
}

/// SVG path commands (`M x y L x y ...`) for a polyline. Non-finite points
/// break the line.
pub fn polyline_commands(points: impl IntoIterator<Item = (f64, f64)>, viewport: &Viewport) -> String {
    let mut out = String::new();
    let mut pen_down = false;
    for (x, y) in points {
        if !x.is_finite() || !y.is_finite() {
            pen_down = false;
            continue;
        }
        let (px, py) = viewport.map((x, y));
        let op = if pen_down { 'L' } else { 'M' };
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{op} {px:.2} {py:.2}");
        pen_down = true;
    }
    out
}

/// Closed outline between two curves sampled at the same x values.
pub fn band_commands(xs: &[f64], upper: impl Fn(f64) -> f64, lower: impl Fn(f64) -> f64, viewport: &Viewport) -> String {
    let forward = xs.iter().map(|&x| (x, upper(x)));
    let back = xs.iter().rev().map(|&x| (x, lower(x)));
    let mut path = polyline_commands(forward.chain(back), viewport);
    if !path.is_empty() {
        path.push_str(" Z");
    }
    path
}
