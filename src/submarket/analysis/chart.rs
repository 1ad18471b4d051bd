//! PNG charts drawn from table columns
//!
//! Charts carry no text. The report supplies the title as the figure caption,
//! so no font backend is needed.

use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::adk::error::ReportError;

/// Pixel size of every chart
pub const CHART_SIZE: (u32, u32) = (800, 500);

const MAX_BINS: usize = 50;

/// Histogram bucket over `[start, end)`; the last bucket also holds `end`
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Scatter(Vec<(f64, f64)>),
    Histogram(Vec<Bin>),
}

impl ChartData {
    /// Equal-width buckets over the range of `values`
    pub fn histogram(values: &[f64], bins: usize) -> Self {
        let bins = bins.clamp(1, MAX_BINS);
        let Some((lo, hi)) = extent(values.iter().copied()) else {
            return ChartData::Histogram(Vec::new());
        };
        let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

        let mut buckets: Vec<Bin> = (0..bins)
            .map(|i| Bin {
                start: lo + width * i as f64,
                end: lo + width * (i + 1) as f64,
                count: 0,
            })
            .collect();
        for value in values {
            let index = (((value - lo) / width) as usize).min(bins - 1);
            buckets[index].count += 1;
        }
        ChartData::Histogram(buckets)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChartData::Scatter(points) => points.is_empty(),
            ChartData::Histogram(bins) => bins.is_empty(),
        }
    }

    fn ranges(&self) -> (Range<f64>, Range<f64>) {
        match self {
            ChartData::Scatter(points) => (
                padded(extent(points.iter().map(|p| p.0))),
                padded(extent(points.iter().map(|p| p.1))),
            ),
            ChartData::Histogram(bins) => {
                let x = extent(bins.iter().flat_map(|b| [b.start, b.end]));
                let top = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1);
                (padded(x), 0.0..top as f64 * 1.1)
            }
        }
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn padded(extent: Option<(f64, f64)>) -> Range<f64> {
    match extent {
        Some((lo, hi)) if hi > lo => {
            let pad = (hi - lo) * 0.05;
            lo - pad..hi + pad
        }
        Some((v, _)) => v - 1.0..v + 1.0,
        None => 0.0..1.0,
    }
}

fn chart_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Render(format!("chart: {}", e))
}

fn draw(data: &ChartData, path: &Path) -> Result<(), ReportError> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let (x, y) = data.ranges();
    let mut chart = ChartBuilder::on(&root)
        .margin(24)
        .build_cartesian_2d(x.clone(), y.clone())
        .map_err(chart_error)?;

    let origin = (x.start, y.start);
    for end in [(x.end, y.start), (x.start, y.end)] {
        chart
            .draw_series(LineSeries::new([origin, end], &BLACK))
            .map_err(chart_error)?;
    }

    match data {
        ChartData::Scatter(points) => {
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(px, py)| Circle::new((px, py), 4, BLUE.filled())),
                )
                .map_err(chart_error)?;
        }
        ChartData::Histogram(bins) => {
            chart
                .draw_series(bins.iter().map(|bin| {
                    Rectangle::new(
                        [(bin.start, 0.0), (bin.end, bin.count as f64)],
                        BLUE.mix(0.6).filled(),
                    )
                }))
                .map_err(chart_error)?;
        }
    }

    root.present().map_err(chart_error)
}

/// Draw `data` into a new PNG under `dir` and return its path
pub fn render_chart(data: &ChartData, dir: &Path) -> Result<PathBuf, ReportError> {
    if data.is_empty() {
        return Err(ReportError::Render("chart has no data points".to_string()));
    }
    std::fs::create_dir_all(dir)?;
    let id = uuid::Uuid::new_v4().simple().to_string();
    let path = dir.join(format!("chart_{}.png", id));

    draw(data, &path)?;
    log::info!("Saved chart {}", path.display());
    Ok(path)
}
