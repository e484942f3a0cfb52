//! Helpers shared by the benches: reading criterion estimates and drawing
//! multi-panel charts into `benches/results`.
#![allow(dead_code)]

use plotters::prelude::*;
use serde::Deserialize;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Deserialize)]
struct Estimates {
    mean: Stats,
}

#[derive(Deserialize)]
struct Stats {
    point_estimate: f64,
    confidence_interval: ConfidenceInterval,
}

#[derive(Deserialize)]
struct ConfidenceInterval {
    lower_bound: f64,
    upper_bound: f64,
}

/// Mean run time of one benchmark in milliseconds, with its confidence interval.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Reads `<group>/<function>/<parameter>/base/estimates.json` below `target/criterion`.
/// Returns `None` when that benchmark has not been run.
pub fn read_timing(group: &str, function: &str, parameter: &str) -> Result<Option<Timing>, Box<dyn Error>> {
    let path = Path::new("target/criterion")
        .join(group)
        .join(function)
        .join(parameter)
        .join("base/estimates.json");
    if !path.exists() {
        return Ok(None);
    }
    let estimates: Estimates = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
    let ns_per_ms = 1_000_000.0;
    Ok(Some(Timing {
        mean: estimates.mean.point_estimate / ns_per_ms,
        lower: estimates.mean.confidence_interval.lower_bound / ns_per_ms,
        upper: estimates.mean.confidence_interval.upper_bound / ns_per_ms,
    }))
}

/// `benches/results/<name>_<git hash>.png`, creating the directory on the way.
pub fn output_path(name: &str) -> Result<PathBuf, Box<dyn Error>> {
    let dir = Path::new("benches/results");
    std::fs::create_dir_all(dir)?;
    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(dir.join(format!("{}_{}.png", name, hash)))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scale {
    Linear,
    Log,
}

impl Scale {
    fn map(self, v: f64) -> Option<f64> {
        match self {
            Scale::Linear => Some(v),
            Scale::Log if v > 0.0 => Some(v.log10()),
            Scale::Log => None,
        }
    }

    fn tick(self, v: f64) -> String {
        match self {
            Scale::Linear => format!("{:.3}", v).trim_end_matches('0').trim_end_matches('.').to_string(),
            Scale::Log => format!("{:.0e}", 10f64.powf(v)),
        }
    }
}

/// One line on a panel. `band` holds the lower and upper edge per point, if any.
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub band: Option<Vec<(f64, f64)>>,
    pub reference: bool,
}

impl Series {
    pub fn line(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Series { label: label.into(), points, band: None, reference: false }
    }

    /// A measured series with its confidence interval drawn as a shaded band.
    pub fn timed(label: impl Into<String>, timings: &[(f64, Timing)]) -> Self {
        Series {
            label: label.into(),
            points: timings.iter().map(|(x, t)| (*x, t.mean)).collect(),
            band: Some(timings.iter().map(|(_, t)| (t.lower, t.upper)).collect()),
            reference: false,
        }
    }

    /// A guide line (ideal speedup, `y = x`, ...) drawn as small black dots.
    pub fn reference(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Series { label: label.into(), points, band: None, reference: true }
    }
}

pub struct Panel {
    pub x_desc: String,
    pub y_desc: String,
    pub x_scale: Scale,
    pub y_scale: Scale,
    pub series: Vec<Series>,
}

impl Panel {
    fn extent(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut xs = (f64::INFINITY, f64::NEG_INFINITY);
        let mut ys = (f64::INFINITY, f64::NEG_INFINITY);
        for s in &self.series {
            let edges = s.band.iter().flatten().flat_map(|&(l, u)| [l, u]);
            for y in s.points.iter().map(|p| p.1).chain(edges).filter_map(|y| self.y_scale.map(y)) {
                ys = (ys.0.min(y), ys.1.max(y));
            }
            for x in s.points.iter().filter_map(|p| self.x_scale.map(p.0)) {
                xs = (xs.0.min(x), xs.1.max(x));
            }
        }
        if !(xs.0 <= xs.1 && ys.0 <= ys.1) {
            return None;
        }
        let pad = |(lo, hi): (f64, f64)| {
            let margin = if hi > lo { 0.05 * (hi - lo) } else { 0.5 };
            (lo - margin, hi + margin)
        };
        Some((pad(xs), pad(ys)))
    }
}

/// Draws `panels` side by side into `path`. Points that cannot be placed on a
/// log axis (zero or negative) are left out.
pub fn plot_panels(path: &Path, title: &str, panels: &[Panel]) -> Result<(), Box<dyn Error>> {
    if panels.is_empty() {
        return Ok(());
    }
    let root = BitMapBackend::new(path, (720 * panels.len() as u32, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 36))?;
    let colors = [RED, BLUE, GREEN, MAGENTA, CYAN];

    for (area, panel) in root.split_evenly((1, panels.len())).iter().zip(panels) {
        let Some(((x0, x1), (y0, y1))) = panel.extent() else {
            continue;
        };
        let mut chart = ChartBuilder::on(area)
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(80)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        let x_tick = |v: &f64| panel.x_scale.tick(*v);
        let y_tick = |v: &f64| panel.y_scale.tick(*v);
        chart
            .configure_mesh()
            .x_desc(panel.x_desc.as_str())
            .y_desc(panel.y_desc.as_str())
            .x_label_formatter(&x_tick)
            .y_label_formatter(&y_tick)
            .draw()?;

        let place = |(x, y): (f64, f64)| Some((panel.x_scale.map(x)?, panel.y_scale.map(y)?));

        for (i, series) in panel.series.iter().enumerate() {
            let placed: Vec<(f64, f64)> = series.points.iter().filter_map(|&p| place(p)).collect();
            if series.reference {
                chart
                    .draw_series(placed.iter().map(|&c| Circle::new(c, 1, BLACK.filled())))?
                    .label(series.label.as_str())
                    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));
                continue;
            }

            let color = colors[i % colors.len()];
            if let Some(band) = &series.band {
                let upper = series.points.iter().zip(band).filter_map(|(p, b)| place((p.0, b.1)));
                let lower: Vec<_> = series.points.iter().zip(band).filter_map(|(p, b)| place((p.0, b.0))).collect();
                let outline: Vec<(f64, f64)> = upper.chain(lower.into_iter().rev()).collect();
                chart.draw_series(std::iter::once(Polygon::new(outline, color.mix(0.2).filled())))?;
            }
            chart
                .draw_series(LineSeries::new(placed.iter().copied(), color))?
                .label(series.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            chart.draw_series(placed.iter().map(|&c| Circle::new(c, 4, color.filled())))?;
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    println!("Plot saved to {:?}", path);
    Ok(())
}
