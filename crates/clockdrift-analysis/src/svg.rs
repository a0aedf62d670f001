//! Renders a [`ChartLayout`] as a grid of drift panels in one SVG document.

use crate::chart::{band_commands, polyline_commands, Viewport};
use crate::error::Result;
use crate::layout::{ChartLayout, Panel, SeriesColors, TrialSpec};
use crate::stats::padded_range;
use crate::trial::{Trial, TrialAnalysis};
use std::fmt::Write;

const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 12.0;
const MARGIN_TOP: f64 = 28.0;
const MARGIN_BOTTOM: f64 = 36.0;
const BAND_OPACITY: f64 = 0.3;
const LEGEND_ROW: f64 = 14.0;

struct Legend {
    color: String,
    text: String,
}

/// Filled area between the fits of a group's two trials.
struct Band {
    label: String,
    fill: String,
}

struct PanelRender {
    title: String,
    y_range: (f64, f64),
    series: Vec<TrialAnalysis>,
    colors: Vec<SeriesColors>,
    band: Option<Band>,
}

pub fn render_svg(layout: &ChartLayout) -> Result<String> {
    let panels = layout
        .panels
        .iter()
        .map(|panel| prepare_panel(panel, layout))
        .collect::<Result<Vec<_>>>()?;

    let columns = layout.columns.max(1);
    let rows = panels.len().div_ceil(columns).max(1);
    let [panel_w, panel_h] = layout.panel_size;
    let width = panel_w * columns as f64;
    let height = panel_h * rows as f64;

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif" font-size="10">"#
    );
    let _ = writeln!(out, r#"<rect width="{width}" height="{height}" fill="white"/>"#);

    for (idx, panel) in panels.iter().enumerate() {
        let left = (idx % columns) as f64 * panel_w + MARGIN_LEFT;
        let top = (idx / columns) as f64 * panel_h + MARGIN_TOP;
        let viewport = Viewport::new(
            (layout.x_range[0], layout.x_range[1]),
            panel.y_range,
            left,
            top,
            panel_w - MARGIN_LEFT - MARGIN_RIGHT,
            panel_h - MARGIN_TOP - MARGIN_BOTTOM,
        );
        write_panel(&mut out, idx, panel, &viewport);
    }

    out.push_str("</svg>\n");
    Ok(out)
}

fn load(spec: &TrialSpec, alpha: f64) -> Result<(TrialAnalysis, SeriesColors)> {
    let analysis = Trial::load(&spec.file, spec.label.clone())?.analyze(alpha)?;
    Ok((analysis, spec.colors.clone()))
}

fn prepare_panel(panel: &Panel, layout: &ChartLayout) -> Result<PanelRender> {
    let [x0, x1] = layout.x_range;
    match panel {
        Panel::Bare { trial } => {
            let (analysis, colors) = load(trial, layout.alpha)?;
            let ends = [analysis.fit.eval(x0), analysis.fit.eval(x1)];
            Ok(PanelRender {
                title: format!("{}: {}", analysis.label, analysis.ppm_label()),
                y_range: padded_range(&ends, layout.padding).unwrap_or((-1.0, 1.0)),
                series: vec![analysis],
                colors: vec![colors],
                band: None,
            })
        }
        Panel::Group { label, fill, trials } => {
            let (first, first_colors) = load(&trials[0], layout.alpha)?;
            let (second, second_colors) = load(&trials[1], layout.alpha)?;
            let ends = [
                first.fit.eval(x0),
                first.fit.eval(x1),
                second.fit.eval(x0),
                second.fit.eval(x1),
            ];
            Ok(PanelRender {
                title: format!("{label}: {:+.1}/{:+.1}ppm", first.ppm(), second.ppm()),
                y_range: padded_range(&ends, layout.padding).unwrap_or((-1.0, 1.0)),
                series: vec![first, second],
                colors: vec![first_colors, second_colors],
                band: Some(Band {
                    label: label.clone(),
                    fill: fill.clone(),
                }),
            })
        }
    }
}

fn write_panel(out: &mut String, idx: usize, panel: &PanelRender, vp: &Viewport) {
    let clip = format!("clip{idx}");
    let (l, t, w, h) = (vp.left, vp.top, vp.width, vp.height);
    let _ = writeln!(out, r#"<g>"#);
    let _ = writeln!(
        out,
        r#"<clipPath id="{clip}"><rect x="{l}" y="{t}" width="{w}" height="{h}"/></clipPath>"#
    );
    let _ = writeln!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
        l + w / 2.0,
        t - 10.0,
        escape(&panel.title)
    );

    // Grid and tick labels.
    for x in Viewport::ticks(vp.x_range, 6) {
        let px = vp.px(x);
        let _ = writeln!(
            out,
            r##"<line x1="{px:.2}" y1="{t}" x2="{px:.2}" y2="{:.2}" stroke="#DDDDDD" stroke-width="0.5"/>"##,
            t + h
        );
        let _ = writeln!(
            out,
            r#"<text x="{px:.2}" y="{:.2}" text-anchor="middle">{x}</text>"#,
            t + h + 12.0
        );
    }
    for y in Viewport::ticks(vp.y_range, 5) {
        let py = vp.py(y);
        let _ = writeln!(
            out,
            r##"<line x1="{l}" y1="{py:.2}" x2="{:.2}" y2="{py:.2}" stroke="#DDDDDD" stroke-width="0.5"/>"##,
            l + w
        );
        let _ = writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end">{}</text>"#,
            l - 4.0,
            py + 3.0,
            format_tick(y)
        );
    }
    let _ = writeln!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">Actual Time, s</text>"#,
        l + w / 2.0,
        t + h + 28.0
    );

    let _ = writeln!(out, r#"<g clip-path="url(#{clip})">"#);
    if (vp.y_range.0..=vp.y_range.1).contains(&0.0) {
        let zero = vp.py(0.0);
        let _ = writeln!(
            out,
            r#"<line x1="{l}" y1="{zero:.2}" x2="{:.2}" y2="{zero:.2}" stroke="gray" stroke-width="3"/>"#,
            l + w
        );
    }

    let mut legend = Vec::new();
    for (analysis, colors) in panel.series.iter().zip(&panel.colors) {
        let raw = polyline_commands(analysis.actual.iter().copied().zip(analysis.delta.iter().copied()), vp);
        let ema = polyline_commands(analysis.actual.iter().copied().zip(analysis.ema.iter().copied()), vp);
        let fit = polyline_commands(analysis.regression_segment(), vp);
        write_path(out, &raw, &colors.raw, 1.0);
        write_path(out, &ema, &colors.ema, 1.0);
        write_path(out, &fit, &colors.poly, 1.5);

        legend.push(Legend { color: colors.raw.clone(), text: format!("{}: RAW", analysis.label) });
        legend.push(Legend { color: colors.ema.clone(), text: format!("{}: EMA", analysis.label) });
        legend.push(Legend {
            color: colors.poly.clone(),
            text: format!("{}: {}", analysis.label, analysis.ppm_label()),
        });
    }

    if let (Some(band), [first, second]) = (&panel.band, panel.series.as_slice()) {
        let (upper, lower) = (first.fit, second.fit);
        let d = band_commands(&[vp.x_range.0, vp.x_range.1], |x| upper.eval(x), |x| lower.eval(x), vp);
        let _ = writeln!(
            out,
            r#"<path d="{d}" fill="{}" fill-opacity="{BAND_OPACITY}" stroke="none"/>"#,
            band.fill
        );
        legend.push(Legend { color: band.fill.clone(), text: band.label.clone() });
    }
    let _ = writeln!(out, "</g>");

    let _ = writeln!(
        out,
        r#"<rect x="{l}" y="{t}" width="{w}" height="{h}" fill="none" stroke="black" stroke-width="0.8"/>"#
    );
    for (row, item) in legend.iter().enumerate() {
        let y = t + 6.0 + row as f64 * LEGEND_ROW;
        let _ = writeln!(
            out,
            r#"<rect x="{:.1}" y="{y:.1}" width="14" height="3" fill="{}"/><text x="{:.1}" y="{:.1}">{}</text>"#,
            l + 6.0,
            item.color,
            l + 24.0,
            y + 4.0,
            escape(&item.text)
        );
    }
    let _ = writeln!(out, "</g>");
}

fn write_path(out: &mut String, d: &str, color: &str, width: f64) {
    if d.is_empty() {
        return;
    }
    let _ = writeln!(
        out,
        r#"<path d="{d}" fill="none" stroke="{color}" stroke-width="{width}"/>"#
    );
}

fn format_tick(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".into() } else { s.into() }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_labels_are_trimmed() {
        assert_eq!(format_tick(0.25), "0.25");
        assert_eq!(format_tick(2.0), "2");
        assert_eq!(format_tick(-0.0001), "0");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("a<b>&c"), "a&lt;b&gt;&amp;c");
    }
}
