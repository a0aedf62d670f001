use anyhow::Result;
use clockdrift_analysis::{millis_per_hour, seconds_per_day, DriftSample, DriftSession, Observation};
use clockdrift_core::{decode_line, parse_rtc_line, RtcLine, TrialRecorder};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What a single device line turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Diagnostic(String),
    Started,
    Duplicate,
    Sample(DriftSample),
}

/// Feeds device lines into a drift session and, optionally, a trial file.
pub struct Tracker {
    session: DriftSession,
    recorder: Option<TrialRecorder>,
}

impl Tracker {
    pub fn new(alpha: f64, record: Option<&Path>) -> Result<Self> {
        let recorder = record.map(TrialRecorder::create).transpose()?;
        Ok(Self {
            session: DriftSession::new(alpha),
            recorder,
        })
    }

    pub fn handle_line(&mut self, bytes: &[u8], at: Instant) -> Result<Handled> {
        let text = decode_line(bytes);
        let ts = match parse_rtc_line(&text) {
            RtcLine::Timestamp(ts) => ts,
            RtcLine::Diagnostic(text) => return Ok(Handled::Diagnostic(text)),
        };

        Ok(match self.session.observe(ts, at) {
            Observation::Started => {
                tracing::info!("first timestamp {ts}, reference timer started");
                Handled::Started
            }
            Observation::Duplicate => Handled::Duplicate,
            Observation::Sample(sample) => {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.record(sample.actual, sample.measured)?;
                }
                Handled::Sample(sample)
            }
        })
    }

    pub fn session(&self) -> &DriftSession {
        &self.session
    }

    pub fn recording(&self) -> Option<&Path> {
        self.recorder.as_ref().map(TrialRecorder::path)
    }

    /// Starts over. An active recording is truncated and restarted.
    pub fn reset(&mut self) -> Result<()> {
        self.session.reset();
        let path: Option<PathBuf> = self.recording().map(Path::to_path_buf);
        if let Some(path) = path {
            self.recorder = Some(TrialRecorder::create(path)?);
        }
        Ok(())
    }

    pub fn summary(&self) -> Option<Summary> {
        self.session.ppm().map(|ppm| Summary {
            samples: self.session.len(),
            ppm,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub samples: usize,
    pub ppm: f64,
}

impl Summary {
    pub fn millis_per_hour(&self) -> f64 {
        millis_per_hour(self.ppm)
    }

    pub fn seconds_per_day(&self) -> f64 {
        seconds_per_day(self.ppm)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:+.1} ppm ({:+.1} ms/h, {:+.2} s/d) over {} samples",
            self.ppm,
            self.millis_per_hour(),
            self.seconds_per_day(),
            self.samples
        )
    }
}
