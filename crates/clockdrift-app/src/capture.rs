//! Headless capture: the monitor's pipeline printing to the terminal.

use crate::tracker::{Handled, Tracker};
use anyhow::{bail, Context, Result};
use clockdrift_analysis::TABLE_HEADER;
use clockdrift_core::{SerialConfig, SerialEvent, SerialService};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct CaptureOptions {
    pub serial: SerialConfig,
    pub alpha: f64,
    pub record: Option<PathBuf>,
    pub duration: Option<Duration>,
    /// Set from the Ctrl-C handler; ends the capture with a summary.
    pub stop: Arc<AtomicBool>,
}

pub fn run(opts: CaptureOptions, out: &mut impl Write) -> Result<()> {
    let mut tracker = Tracker::new(opts.alpha, opts.record.as_deref())?;
    let port = opts.serial.port_name.clone();
    let service = SerialService::open(opts.serial).with_context(|| format!("opening {port}"))?;
    let deadline = opts.duration.map(|d| Instant::now() + d);

    writeln!(out, "{TABLE_HEADER}")?;
    let pumped = pump(service.events(), &mut tracker, &port, deadline, &opts.stop, out);
    service.close();
    pumped?;
    write_summary(&tracker, out)
}

/// Handles serial events until the deadline, a stop request or the port closing.
fn pump(
    events: &Receiver<SerialEvent>,
    tracker: &mut Tracker,
    port: &str,
    deadline: Option<Instant>,
    stop: &AtomicBool,
    out: &mut impl Write,
) -> Result<()> {
    loop {
        if stop.load(Ordering::SeqCst) {
            tracing::info!("capture interrupted");
            return Ok(());
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("capture duration reached");
            return Ok(());
        }

        let event = match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };

        match event {
            SerialEvent::Opened(port) => tracing::info!("listening on {port}"),
            SerialEvent::Line { bytes, at } => match tracker.handle_line(&bytes, at)? {
                Handled::Sample(sample) => writeln!(out, "{sample}")?,
                Handled::Diagnostic(text) => writeln!(out, "> {text}")?,
                Handled::Started | Handled::Duplicate => {}
            },
            SerialEvent::Error(e) => tracing::warn!("{port}: {e}"),
            SerialEvent::Closed => {
                if tracker.session().is_empty() {
                    bail!("{port} closed before any samples arrived");
                }
                tracing::warn!("{port} closed");
                return Ok(());
            }
        }
        out.flush()?;
    }
}

fn write_summary(tracker: &Tracker, out: &mut impl Write) -> Result<()> {
    match tracker.summary() {
        Some(summary) => writeln!(out, "# {summary}")?,
        None => writeln!(out, "# not enough samples for a drift estimate")?,
    }
    if let Some(path) = tracker.recording() {
        writeln!(out, "# trial written to {}", path.display())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn line(text: &str, at: Instant) -> SerialEvent {
        SerialEvent::Line { bytes: text.as_bytes().to_vec(), at }
    }

    fn capture(events: &Receiver<SerialEvent>, stop: &AtomicBool) -> Result<String> {
        let mut tracker = Tracker::new(0.1, None)?;
        let mut out = Vec::new();
        pump(events, &mut tracker, "COM9", None, stop, &mut out)?;
        write_summary(&tracker, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn stop_request_still_prints_summary() {
        let (tx, rx) = unbounded();
        let t0 = Instant::now();
        tx.send(SerialEvent::Opened("COM9".into())).unwrap();
        for n in 0..4u64 {
            tx.send(line(&format!("01.01.2025 00:00:0{n}"), t0 + Duration::from_secs(n))).unwrap();
        }
        tx.send(line("RTC lost power", t0)).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let interrupter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
        });

        // The sender stays alive, so only the stop flag can end the loop.
        let text = capture(&rx, &stop).unwrap();
        interrupter.join().unwrap();
        drop(tx);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5, "{text}");
        assert!(lines[..3].iter().all(|l| l.matches('\t').count() == 4));
        assert_eq!(lines[3], "> RTC lost power");
        assert!(lines[4].starts_with("# ") && lines[4].ends_with(" over 3 samples"), "{}", lines[4]);
    }

    #[test]
    fn stop_before_any_data() {
        let (_tx, rx) = unbounded();
        let stop = AtomicBool::new(true);
        assert_eq!(
            capture(&rx, &stop).unwrap(),
            "# not enough samples for a drift estimate\n"
        );
    }

    #[test]
    fn close_without_samples_is_an_error() {
        let (tx, rx) = unbounded();
        tx.send(SerialEvent::Closed).unwrap();
        let err = capture(&rx, &AtomicBool::new(false)).unwrap_err();
        assert!(err.to_string().contains("COM9 closed"));
    }
}
