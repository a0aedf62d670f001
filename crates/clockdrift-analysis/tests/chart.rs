use clockdrift_analysis::{render_svg, AnalysisError, ChartLayout, Panel};
use std::path::Path;

/// Writes a trial whose RTC drifts by `ppm` relative to the host.
fn write_trial(path: &Path, ppm: f64) {
    let mut text = String::from("actual;measured\n");
    for n in 0..=600 {
        let actual = n as f64 * (1.0 - ppm * 1e-6);
        text.push_str(&format!("{actual};{n}\n"));
    }
    std::fs::write(path, text).unwrap();
}

#[test]
fn renders_default_four_panel_chart() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ChartLayout::default_for(dir.path());
    let mut drift = 12.0;
    for panel in &layout.panels {
        let specs: Vec<_> = match panel {
            Panel::Bare { trial } => vec![trial],
            Panel::Group { trials, .. } => trials.iter().collect(),
        };
        for spec in specs {
            write_trial(&spec.file, drift);
            drift -= 4.0;
        }
    }

    let svg = render_svg(&layout).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.trim_end().ends_with("</svg>"));
    assert!(svg.contains("Bare: +12.0ppm"));
    assert!(svg.contains("5.1+(5/20): +8.0/+4.0ppm"));
    assert!(svg.contains("22+(5/20): -8.0/-12.0ppm"));
    assert_eq!(svg.matches("fill-opacity=\"0.3\"").count(), 3);
    for group in ["5.1+(5/20)", "10+(5/20)", "22+(5/20)"] {
        assert!(svg.contains(&format!(">{group}</text>")), "no band legend for {group}");
    }
}

#[test]
fn layout_paths_are_relative_to_layout_file() {
    let dir = tempfile::tempdir().unwrap();
    write_trial(&dir.path().join("only.csv"), -3.0);
    let layout_path = dir.path().join("layout.json");
    std::fs::write(
        &layout_path,
        r##"{
            "x_range": [0, 300],
            "columns": 1,
            "panels": [
                { "kind": "bare", "trial": { "file": "only.csv", "label": "Only",
                  "colors": { "raw": "#111111", "ema": "#222222", "poly": "#333333" } } }
            ]
        }"##,
    )
    .unwrap();

    let layout = ChartLayout::load(&layout_path).unwrap();
    let svg = render_svg(&layout).unwrap();
    assert!(svg.contains("Only: -3.0ppm"));
}

#[test]
fn missing_trial_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ChartLayout::default_for(dir.path());
    let err = render_svg(&layout).unwrap_err();
    assert!(matches!(err, AnalysisError::Io { ref path, .. } if path.ends_with("bare.csv")));
}
