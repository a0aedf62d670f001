//! Live drift estimation from a stream of RTC timestamps.
//!
//! The host clock is the reference. Each new RTC second yields one sample:
//! how far the RTC's elapsed time has run ahead of (positive) or behind
//! (negative) the host's elapsed time since the first timestamp.

use crate::stats::{fit_line, Ema, LineFit};
use chrono::NaiveDateTime;
use std::fmt;
use std::time::Instant;

pub const DEFAULT_ALPHA: f64 = 0.1;

pub const TABLE_HEADER: &str = "Actual Time\tMeasured Time\tDelta\tEMA\tPPM";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftSample {
    /// Host seconds since the first timestamp.
    pub actual: f64,
    /// Whole RTC seconds since the first timestamp.
    pub measured: i64,
    pub delta: f64,
    pub ema: f64,
    /// `None` until two samples exist.
    pub ppm: Option<f64>,
}

impl fmt::Display for DriftSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}\t", self.actual, self.measured, self.delta, self.ema)?;
        match self.ppm {
            Some(ppm) => write!(f, "{ppm}"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// First timestamp; starts the reference timer.
    Started,
    /// Same second as the previous line.
    Duplicate,
    Sample(DriftSample),
}

#[derive(Debug)]
pub struct DriftSession {
    alpha: f64,
    start: Option<(Instant, NaiveDateTime)>,
    prev: Option<NaiveDateTime>,
    ema: Ema,
    actual: Vec<f64>,
    delta: Vec<f64>,
    smoothed: Vec<f64>,
    fit: Option<LineFit>,
}

impl Default for DriftSession {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl DriftSession {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            start: None,
            prev: None,
            ema: Ema::new(alpha),
            actual: Vec::new(),
            delta: Vec::new(),
            smoothed: Vec::new(),
            fit: None,
        }
    }

    pub fn observe(&mut self, rtc: NaiveDateTime, at: Instant) -> Observation {
        let Some((start_at, start_rtc)) = self.start else {
            self.start = Some((at, rtc));
            self.prev = Some(rtc);
            return Observation::Started;
        };

        if self.prev == Some(rtc) {
            return Observation::Duplicate;
        }
        self.prev = Some(rtc);

        let actual = at.saturating_duration_since(start_at).as_secs_f64();
        let measured = (rtc - start_rtc).num_seconds();
        let delta = measured as f64 - actual;
        let ema = self.ema.update(delta);

        self.actual.push(actual);
        self.delta.push(delta);
        self.smoothed.push(ema);
        self.fit = fit_line(&self.actual, &self.smoothed);

        Observation::Sample(DriftSample {
            actual,
            measured,
            delta,
            ema,
            ppm: self.ppm(),
        })
    }

    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    pub fn actual(&self) -> &[f64] {
        &self.actual
    }

    pub fn delta(&self) -> &[f64] {
        &self.delta
    }

    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    pub fn fit(&self) -> Option<LineFit> {
        self.fit
    }

    pub fn ppm(&self) -> Option<f64> {
        self.fit.map(|f| f.ppm())
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::time::Duration;

    fn rtc(sec: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + ChronoDuration::seconds(sec)
    }

    #[test]
    fn first_timestamp_only_starts() {
        let mut session = DriftSession::default();
        assert_eq!(session.observe(rtc(0), Instant::now()), Observation::Started);
        assert!(session.is_started());
        assert!(session.is_empty());
    }

    #[test]
    fn duplicates_are_skipped() {
        let t0 = Instant::now();
        let mut session = DriftSession::default();
        session.observe(rtc(0), t0);
        assert_eq!(session.observe(rtc(0), t0 + Duration::from_millis(300)), Observation::Duplicate);
        assert!(session.is_empty());
    }

    #[test]
    fn fast_rtc_gives_positive_ppm() {
        let t0 = Instant::now();
        let mut session = DriftSession::new(1.0);
        session.observe(rtc(0), t0);

        // RTC ticks every 0.99998 host seconds: 20 ppm fast.
        let mut last = None;
        for n in 1..=100i64 {
            let at = t0 + Duration::from_secs_f64(n as f64 * 0.99998);
            if let Observation::Sample(s) = session.observe(rtc(n), at) {
                assert_eq!(s.measured, n);
                last = Some(s);
            }
        }

        let last = last.unwrap();
        assert!((last.ppm.unwrap() - 20.0).abs() < 0.5, "{:?}", last.ppm);
        assert_eq!(session.len(), 100);
    }

    #[test]
    fn first_sample_has_no_ppm() {
        let t0 = Instant::now();
        let mut session = DriftSession::default();
        session.observe(rtc(0), t0);
        let Observation::Sample(s) = session.observe(rtc(1), t0 + Duration::from_millis(1000)) else {
            panic!("expected a sample");
        };
        assert_eq!(s.ppm, None);
        assert!(s.to_string().ends_with('\t'));
    }

    #[test]
    fn reset_forgets_everything() {
        let t0 = Instant::now();
        let mut session = DriftSession::default();
        session.observe(rtc(0), t0);
        session.observe(rtc(1), t0 + Duration::from_secs(1));
        session.reset();
        assert!(!session.is_started());
        assert_eq!(session.observe(rtc(5), t0), Observation::Started);
    }
}
