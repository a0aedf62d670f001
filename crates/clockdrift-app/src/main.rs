mod capture;
mod monitor;
mod plot;
mod settings;
mod tracker;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clockdrift_analysis::{render_svg, ChartLayout, Trial};
use clockdrift_core::{SerialConfig, SerialService};
use settings::Settings;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clockdrift", version, about = "Measures RTC oscillator drift over a serial link")]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports.
    Ports,
    /// Open the live drift window (default).
    Monitor(LinkArgs),
    /// Print drift rows to the terminal without a window.
    Capture {
        #[command(flatten)]
        link: LinkArgs,
        /// Stop after this many seconds.
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Estimate drift of recorded trial files.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        alpha: Option<f64>,
    },
    /// Render recorded trials as a comparison chart.
    Chart {
        /// Layout file (JSON). Without it the standard four-panel layout is used.
        #[arg(long, conflicts_with = "dir")]
        layout: Option<PathBuf>,
        /// Directory holding the trial files of the standard layout.
        #[arg(long, default_value = "resources")]
        dir: PathBuf,
        #[arg(short, long, default_value = "chart.svg")]
        out: PathBuf,
        /// Write the layout in use as JSON, as a starting point for editing.
        #[arg(long)]
        write_layout: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct LinkArgs {
    #[arg(short, long)]
    port: Option<String>,
    #[arg(short, long)]
    baud: Option<u32>,
    /// EMA smoothing factor for the delta series.
    #[arg(long)]
    alpha: Option<f64>,
    /// Record `(actual, measured)` rows to this trial file.
    #[arg(long)]
    record: Option<PathBuf>,
    /// Hold DTR low so boards that reset on DTR keep running.
    #[arg(long)]
    no_dtr: bool,
}

impl LinkArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(alpha) = self.alpha {
            settings.alpha = alpha;
        }
        if self.no_dtr {
            settings.dtr = false;
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn validate_alpha(alpha: f64) -> Result<()> {
    anyhow::ensure!(alpha > 0.0 && alpha <= 1.0, "alpha must be in (0, 1], got {alpha}");
    Ok(())
}

fn validate_duration(secs: f64) -> Result<Duration> {
    anyhow::ensure!(
        secs.is_finite() && secs > 0.0,
        "duration must be a positive number of seconds, got {secs}"
    );
    Ok(Duration::from_secs_f64(secs))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings_path = cli.config.clone().or_else(Settings::default_path);
    let mut settings = Settings::load_or_default(settings_path.as_deref());

    match cli.command.unwrap_or(Command::Monitor(LinkArgs::default())) {
        Command::Ports => {
            for port in SerialService::list_ports() {
                let product = port.product.as_deref().unwrap_or("");
                println!("{}\t{}\t{}", port.display_name(), port.port_type, product);
            }
        }
        Command::Monitor(link) => {
            link.apply(&mut settings);
            validate_alpha(settings.alpha)?;
            let record = link.record.as_deref().map(|p| settings.resolve_record_path(p));
            let settings = monitor::run(monitor::MonitorOptions { settings, record })?;
            if let Some(path) = &settings_path {
                if let Err(e) = settings.save(path) {
                    tracing::warn!("{e:#}");
                }
            }
        }
        Command::Capture { link, duration } => {
            link.apply(&mut settings);
            validate_alpha(settings.alpha)?;
            let duration = duration.map(validate_duration).transpose()?;
            let port_name = settings
                .port
                .clone()
                .context("no port given; pass --port or run `clockdrift ports`")?;
            let opts = capture::CaptureOptions {
                serial: SerialConfig {
                    port_name,
                    baud_rate: settings.baud_rate,
                    dtr: settings.dtr,
                    ..Default::default()
                },
                alpha: settings.alpha,
                record: link.record.as_deref().map(|p| settings.resolve_record_path(p)),
                duration,
                stop: Arc::new(AtomicBool::new(false)),
            };
            let stop = opts.stop.clone();
            ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
                .context("installing the Ctrl-C handler")?;
            capture::run(opts, &mut std::io::stdout().lock())?;
        }
        Command::Analyze { files, alpha } => {
            let alpha = alpha.unwrap_or(settings.alpha);
            validate_alpha(alpha)?;
            let failed = analyze_files(&files, alpha, &mut std::io::stdout().lock())?;
            anyhow::ensure!(failed < files.len(), "no trial file could be analyzed");
        }
        Command::Chart { layout, dir, out, write_layout } => {
            let layout = match layout {
                Some(path) => ChartLayout::load(&path)?,
                None => ChartLayout::default_for(&dir),
            };
            if let Some(path) = write_layout {
                std::fs::write(&path, layout.to_json())
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            let svg = render_svg(&layout)?;
            std::fs::write(&out, svg).with_context(|| format!("writing {}", out.display()))?;
            tracing::info!("chart written to {}", out.display());
        }
    }
    Ok(())
}

/// Prints one summary line per file. A bad file is reported on stderr and
/// skipped; returns how many failed.
fn analyze_files(files: &[PathBuf], alpha: f64, out: &mut impl Write) -> Result<usize> {
    let mut failed = 0;
    for file in files {
        match analyze_file(file, alpha) {
            Ok(summary) => writeln!(out, "{}: {summary}", file.display())?,
            Err(e) => {
                eprintln!("{}: {e:#}", file.display());
                failed += 1;
            }
        }
    }
    Ok(failed)
}

fn analyze_file(path: &Path, alpha: f64) -> Result<tracker::Summary> {
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let trial = Trial::load(path, label)?;
    let analysis = trial.analyze(alpha)?;
    Ok(tracker::Summary {
        samples: trial.len(),
        ppm: analysis.ppm(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn link_args_override_settings() {
        let cli = Cli::parse_from(["clockdrift", "capture", "-p", "COM5", "--baud", "115200", "--no-dtr"]);
        let Some(Command::Capture { link, duration }) = cli.command else {
            panic!("expected capture");
        };
        let mut settings = Settings::default();
        link.apply(&mut settings);
        assert_eq!(settings.port.as_deref(), Some("COM5"));
        assert_eq!(settings.baud_rate, 115_200);
        assert!(!settings.dtr);
        assert_eq!(duration, None);
    }

    #[test]
    fn analyzes_trial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.csv");
        let rows: String = (0..100).map(|n| format!("{};{n}\n", n as f64 * 0.99999)).collect();
        std::fs::write(&path, format!("actual;measured\n{rows}")).unwrap();

        let summary = analyze_file(&path, 1.0).unwrap();
        assert_eq!(summary.samples, 100);
        assert!((summary.ppm - 10.0).abs() < 0.01);
    }

    #[test]
    fn keeps_going_after_a_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.csv");
        let rows: String = (0..10).map(|n| format!("{n};{n}\n")).collect();
        std::fs::write(&good, format!("actual;measured\n{rows}")).unwrap();
        let missing = dir.path().join("missing.csv");

        let mut out = Vec::new();
        let failed = analyze_files(&[missing, good.clone()], 0.1, &mut out).unwrap();
        assert_eq!(failed, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&format!("{}: ", good.display())), "{text}");
        assert!(text.trim_end().ends_with("over 10 samples"));
    }

    #[test]
    fn rejects_bad_duration() {
        for secs in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            assert!(validate_duration(secs).is_err(), "{secs}");
        }
        assert_eq!(validate_duration(1.5).unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn rejects_bad_alpha() {
        assert!(validate_alpha(0.0).is_err());
        assert!(validate_alpha(1.5).is_err());
        assert!(validate_alpha(0.1).is_ok());
    }
}
