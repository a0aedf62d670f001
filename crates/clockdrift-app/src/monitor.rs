slint::include_modules!();

use crate::plot::live_paths;
use crate::settings::Settings;
use crate::tracker::{Handled, Tracker};
use anyhow::Result;
use clockdrift_core::{EntryKind, LogStore, SerialConfig, SerialEvent, SerialService};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct MonitorOptions {
    pub settings: Settings,
    pub record: Option<PathBuf>,
}

struct State {
    service: Option<SerialService>,
    tracker: Tracker,
    log: LogStore,
}

pub fn run(opts: MonitorOptions) -> Result<Settings> {
    let MonitorOptions { mut settings, record } = opts;
    let app = MainWindow::new()?;

    let state = Rc::new(RefCell::new(State {
        service: None,
        tracker: Tracker::new(settings.alpha, record.as_deref())?,
        log: LogStore::new(settings.max_log_lines),
    }));

    app.set_baud_text(settings.baud_rate.to_string().into());
    app.set_dtr(settings.dtr);
    if let Some(path) = state.borrow().tracker.recording() {
        app.set_record_text(format!("recording to {}", path.display()).into());
    }
    refresh_ports(&app, settings.port.as_deref());

    // Connect button
    {
        let app_weak = app.as_weak();
        let state = state.clone();
        app.on_connect_clicked(move || {
            let Some(app) = app_weak.upgrade() else { return };
            let port_display = app.get_selected_port().to_string();
            let port_name = port_display.split_whitespace().next().unwrap_or_default().to_string();
            let baud_rate = app.get_baud_text().parse().unwrap_or(9_600);

            let config = SerialConfig {
                port_name: port_name.clone(),
                baud_rate,
                dtr: app.get_dtr(),
                ..Default::default()
            };

            let mut state = state.borrow_mut();
            match SerialService::open(config) {
                Ok(service) => {
                    state.service = Some(service);
                    app.set_is_connected(true);
                }
                Err(e) => {
                    tracing::error!("{e}");
                    state.log.push(EntryKind::Status, format!("connect failed: {e}"));
                }
            }
            update_log(&app, &state.log);
        });
    }

    // Disconnect button
    {
        let app_weak = app.as_weak();
        let state = state.clone();
        app.on_disconnect_clicked(move || {
            let Some(app) = app_weak.upgrade() else { return };
            let mut state = state.borrow_mut();
            if let Some(service) = state.service.take() {
                service.close();
            }
            app.set_is_connected(false);
            state.log.push(EntryKind::Status, "disconnected");
            update_log(&app, &state.log);
        });
    }

    // Reset button
    {
        let app_weak = app.as_weak();
        let state = state.clone();
        app.on_reset_clicked(move || {
            let Some(app) = app_weak.upgrade() else { return };
            let mut state = state.borrow_mut();
            state.log.clear();
            state.log.push(EntryKind::Sample, clockdrift_analysis::TABLE_HEADER);
            if let Err(e) = state.tracker.reset() {
                state.log.push(EntryKind::Status, format!("reset failed: {e:#}"));
            }
            update_chart(&app, &state.tracker);
            update_log(&app, &state.log);
        });
    }

    // Refresh ports button
    {
        let app_weak = app.as_weak();
        app.on_refresh_ports_clicked(move || {
            let Some(app) = app_weak.upgrade() else { return };
            refresh_ports(&app, None);
        });
    }

    // DTR toggle
    {
        let state = state.clone();
        app.on_dtr_toggled(move |level| {
            if let Some(service) = state.borrow().service.as_ref() {
                if let Err(e) = service.set_dtr(level) {
                    tracing::warn!("DTR: {e}");
                }
            }
        });
    }

    // Display options changed
    {
        let app_weak = app.as_weak();
        let state = state.clone();
        app.on_display_options_changed(move || {
            let Some(app) = app_weak.upgrade() else { return };
            let mut state = state.borrow_mut();
            state.log.set_show_diagnostics(app.get_show_diagnostics());
            update_log(&app, &state.log);
        });
    }

    state.borrow_mut().log.push(EntryKind::Sample, clockdrift_analysis::TABLE_HEADER);
    update_log(&app, &state.borrow().log);

    // Event polling timer
    let timer = slint::Timer::default();
    {
        let app_weak = app.as_weak();
        let state = state.clone();
        timer.start(slint::TimerMode::Repeated, POLL_INTERVAL, move || {
            let Some(app) = app_weak.upgrade() else { return };
            let mut state = state.borrow_mut();
            if poll_events(&app, &mut state) {
                update_chart(&app, &state.tracker);
                update_log(&app, &state.log);
            }
        });
    }

    app.run()?;

    if let Some(service) = state.borrow_mut().service.take() {
        service.close();
    }

    let port = app.get_selected_port().to_string();
    settings.port = port.split_whitespace().next().map(str::to_string);
    settings.baud_rate = app.get_baud_text().parse().unwrap_or(settings.baud_rate);
    settings.dtr = app.get_dtr();
    Ok(settings)
}

/// Drains pending serial events. Returns whether anything visible changed.
fn poll_events(app: &MainWindow, state: &mut State) -> bool {
    let State { service, tracker, log } = state;
    let Some(svc) = service.as_ref() else {
        return false;
    };

    let mut changed = false;
    let mut closed = false;
    while let Ok(event) = svc.events().try_recv() {
        match event {
            SerialEvent::Opened(port) => {
                log.push(EntryKind::Status, format!("connected to {port}"));
                changed = true;
            }
            SerialEvent::Line { bytes, at } => match tracker.handle_line(&bytes, at) {
                Ok(Handled::Sample(sample)) => {
                    log.push(EntryKind::Sample, sample.to_string());
                    changed = true;
                }
                Ok(Handled::Diagnostic(text)) => {
                    log.push(EntryKind::Diagnostic, text);
                    changed = true;
                }
                Ok(Handled::Started | Handled::Duplicate) => {}
                Err(e) => {
                    log.push(EntryKind::Status, format!("recording failed: {e:#}"));
                    changed = true;
                }
            },
            SerialEvent::Error(e) => {
                log.push(EntryKind::Status, format!("error: {e}"));
                changed = true;
            }
            SerialEvent::Closed => {
                log.push(EntryKind::Status, "port closed");
                closed = true;
                changed = true;
            }
        }
    }

    if closed {
        *service = None;
        app.set_is_connected(false);
    }
    changed
}

fn update_chart(app: &MainWindow, tracker: &Tracker) {
    let session = tracker.session();
    let paths = live_paths(session);
    app.set_raw_path(paths.raw.into());
    app.set_ema_path(paths.ema.into());
    app.set_fit_path(paths.fit.into());
    app.set_zero_path(paths.zero.into());
    app.set_y_max_text(format!("{:.3} s", paths.y_range.1).into());
    app.set_y_min_text(format!("{:.3} s", paths.y_range.0).into());
    app.set_x_max_text(format!("{:.0}", paths.x_max).into());
    app.set_samples_text(session.len().to_string().into());

    match tracker.summary() {
        Some(summary) => {
            app.set_ppm_text(format!("{:+.1} ppm", summary.ppm).into());
            app.set_ms_per_hour_text(format!("{:+.1} ms/h", summary.millis_per_hour()).into());
            app.set_s_per_day_text(format!("{:+.2} s/d", summary.seconds_per_day()).into());
        }
        None => {
            app.set_ppm_text("n/a".into());
            app.set_ms_per_hour_text("n/a".into());
            app.set_s_per_day_text("n/a".into());
        }
    }
}

fn refresh_ports(app: &MainWindow, preferred: Option<&str>) {
    let ports = SerialService::list_ports();
    let port_names: Vec<slint::SharedString> = ports.iter().map(|p| p.display_name().into()).collect();

    let port_list = Rc::new(slint::VecModel::from(port_names.clone()));
    app.set_port_list(port_list.into());

    let preferred = preferred.and_then(|name| {
        port_names
            .iter()
            .find(|display| display.split_whitespace().next() == Some(name))
            .cloned()
    });
    if let Some(display) = preferred {
        app.set_selected_port(display);
    } else if !port_names.is_empty() && app.get_selected_port().is_empty() {
        app.set_selected_port(port_names[0].clone());
    }
}

fn update_log(app: &MainWindow, log: &LogStore) {
    app.set_log_text(log.to_text().into());
}
