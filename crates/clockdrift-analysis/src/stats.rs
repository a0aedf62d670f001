/// Exponential moving average with smoothing factor `alpha`.
///
/// The first value seeds the average unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn smooth(values: &[f64], alpha: f64) -> Vec<f64> {
        let mut ema = Self::new(alpha);
        values.iter().map(|&x| ema.update(x)).collect()
    }
}

/// `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Drift in parts per million. Slope is seconds of drift per second.
    pub fn ppm(&self) -> f64 {
        self.slope * 1e6
    }
}

/// Ordinary least-squares fit of a straight line.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    if sxx == 0.0 || !sxx.is_finite() {
        return None;
    }

    let slope = sxy / sxx;
    Some(LineFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

pub fn millis_per_hour(ppm: f64) -> f64 {
    ppm * 3.6
}

pub fn seconds_per_day(ppm: f64) -> f64 {
    ppm * 86_400.0 / 1e6
}

/// Min/max of `values` widened by `padding` times the range on each side.
pub fn padded_range(values: &[f64], padding: f64) -> Option<(f64, f64)> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;

    let range = max - min;
    if range == 0.0 {
        return Some((min - 1.0, max + 1.0));
    }
    Some((min - range * padding, max + range * padding))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ema_seeds_with_first_value() {
        let out = Ema::smooth(&[1.0, 0.0, 0.0], 0.1);
        assert!(close(out[0], 1.0));
        assert!(close(out[1], 0.9));
        assert!(close(out[2], 0.81));
    }

    #[test]
    fn fits_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2e-5 * x - 0.5).collect();
        let fit = fit_line(&xs, &ys).unwrap();
        assert!(close(fit.slope, 2e-5));
        assert!(close(fit.intercept, -0.5));
        assert!(close(fit.ppm(), 20.0));
    }

    #[test]
    fn fit_needs_two_distinct_x() {
        assert_eq!(fit_line(&[1.0], &[1.0]), None);
        assert_eq!(fit_line(&[2.0, 2.0], &[1.0, 3.0]), None);
    }

    #[test]
    fn drift_units() {
        assert!(close(millis_per_hour(10.0), 36.0));
        assert!(close(seconds_per_day(10.0), 0.864));
    }

    #[test]
    fn padding_widens_range() {
        assert_eq!(padded_range(&[0.0, 10.0, 5.0], 0.05), Some((-0.5, 10.5)));
        assert_eq!(padded_range(&[3.0, 3.0], 0.05), Some((2.0, 4.0)));
        assert_eq!(padded_range(&[], 0.05), None);
    }
}
