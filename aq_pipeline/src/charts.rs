//! SVG charts for forecasts, hindcasts and the dashboard.
//!
//! Charts are described by a [`ChartSpec`] (plain data, testable without
//! rendering) and drawn with `plotters`' SVG backend.

use std::path::Path;

use chrono::NaiveDate;
use plotters::{coord::types::RangedDate, prelude::*};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart {0:?} has no data points")]
    Empty(String),

    #[error("drawing {title:?} failed: {message}")]
    Draw { title: String, message: String },
}

/// An air-quality category drawn as a background band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AqiBand {
    pub label: &'static str,
    pub low: f64,
    pub high: f64,
    pub color: RGBColor,
}

pub static AQI_BANDS: [AqiBand; 6] = [
    AqiBand { label: "Good", low: 0.0, high: 49.0, color: RGBColor(0, 228, 0) },
    AqiBand { label: "Moderate", low: 50.0, high: 99.0, color: RGBColor(255, 255, 0) },
    AqiBand { label: "Unhealthy for Some", low: 100.0, high: 149.0, color: RGBColor(255, 126, 0) },
    AqiBand { label: "Unhealthy", low: 150.0, high: 199.0, color: RGBColor(255, 0, 0) },
    AqiBand { label: "Very Unhealthy", low: 200.0, high: 299.0, color: RGBColor(143, 63, 151) },
    AqiBand { label: "Hazardous", low: 300.0, high: 500.0, color: RGBColor(126, 0, 35) },
];

/// Category of a PM2.5 value; values above the top band are hazardous.
pub fn aqi_band(value: f64) -> &'static AqiBand {
    AQI_BANDS
        .iter()
        .find(|b| value < b.high + 1.0)
        .unwrap_or(&AQI_BANDS[AQI_BANDS.len() - 1])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Line,
    Points,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(NaiveDate, f64)>,
    pub mark: Mark,
}

impl Series {
    pub fn line(label: impl Into<String>, mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.sort_by_key(|p| p.0);
        Self {
            label: label.into(),
            points,
            mark: Mark::Line,
        }
    }

    pub fn points(label: impl Into<String>, mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.sort_by_key(|p| p.0);
        Self {
            label: label.into(),
            points,
            mark: Mark::Points,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub series: Vec<Series>,
    pub aqi_bands: bool,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            series: Vec::new(),
            aqi_bands: false,
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        if !series.points.is_empty() {
            self.series.push(series);
        }
        self
    }

    pub fn with_aqi_bands(mut self) -> Self {
        self.aqi_bands = true;
        self
    }

    /// First and last date over all series, widened to at least one day.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.series.iter().flat_map(|s| s.points.iter().map(|p| p.0));
        let first = dates.next()?;
        let (lo, hi) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        let hi = if hi == lo { hi.succ_opt().unwrap_or(hi) } else { hi };
        Some((lo, hi))
    }

    /// Y range starting at zero with 10% headroom.
    pub fn value_range(&self) -> (f64, f64) {
        let max = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .fold(0.0_f64, f64::max);
        let top = if max > 0.0 { max * 1.1 } else { 1.0 };
        (0.0, top)
    }
}

static PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(214, 39, 40),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
    RGBColor(148, 103, 189),
    RGBColor(23, 190, 207),
];

/// Draw `spec` into an SVG file at `path`.
pub fn render_svg(spec: &ChartSpec, path: &Path) -> Result<(), ChartError> {
    let (first, last) = spec
        .date_range()
        .ok_or_else(|| ChartError::Empty(spec.title.clone()))?;
    let (y_lo, y_hi) = spec.value_range();
    let draw_err = |e: &dyn std::fmt::Display| ChartError::Draw {
        title: spec.title.clone(),
        message: e.to_string(),
    };

    let root = SVGBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(RangedDate::from(first..last), y_lo..y_hi)
        .map_err(|e| draw_err(&e))?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("PM2.5")
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
        .light_line_style(BLACK.mix(0.1))
        .draw()
        .map_err(|e| draw_err(&e))?;

    if spec.aqi_bands {
        chart
            .draw_series(
                AQI_BANDS
                    .iter()
                    .filter(|b| b.low < y_hi)
                    .map(|b| Rectangle::new([(first, b.low), (last, b.high.min(y_hi))], b.color.mix(0.2).filled())),
            )
            .map_err(|e| draw_err(&e))?;
    }

    for (i, series) in spec.series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let drawn = match series.mark {
            Mark::Line => chart
                .draw_series(LineSeries::new(series.points.iter().copied(), color.stroke_width(2)))
                .map_err(|e| draw_err(&e))?,
            Mark::Points => chart
                .draw_series(series.points.iter().map(|&p| Circle::new(p, 4, color.filled())))
                .map_err(|e| draw_err(&e))?,
        };
        drawn
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| draw_err(&e))?;

    root.present().map_err(|e| draw_err(&e))
}

/// File-system friendly form of a place key.
pub fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
