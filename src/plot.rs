//! Static line charts rendered with `plotters`.
//!
//! Chart content is assembled into a [`LineChart`] first and only then drawn,
//! so the data going into every chart can be inspected without a backend.
//! Paths ending in `.svg` are written as SVG, anything else as PNG.

use crate::align::ComparisonTable;
use crate::core::{SampleForecast, TimeSeries};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, DurationRound, Utc};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use std::path::Path;

/// matplotlib's default color cycle.
const PALETTE: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
];

/// Default canvas size in pixels.
pub const DEFAULT_SIZE: (u32, u32) = (640, 480);

/// Where the legend box is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendPosition {
    UpperLeft,
    UpperRight,
}

/// Background grid lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grid {
    Off,
    /// Lines at every tick on both axes.
    Full,
    /// Horizontal lines at y ticks plus a vertical line at each midnight.
    Daily,
}

/// One labelled line.
#[derive(Debug, Clone)]
pub struct Line {
    pub label: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
    pub color: RGBColor,
}

/// A filled band between two curves sharing one set of timestamps.
#[derive(Debug, Clone)]
pub struct Band {
    pub label: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub color: RGBColor,
}

#[derive(Debug, Clone)]
enum Element {
    Line(Line),
    Band(Band),
}

/// Description of a time-indexed chart, independent of any backend.
#[derive(Debug, Clone)]
pub struct LineChart {
    elements: Vec<Element>,
    x_label: Option<String>,
    y_label: Option<String>,
    legend: LegendPosition,
    grid: Grid,
    size: (u32, u32),
}

impl Default for LineChart {
    fn default() -> Self {
        Self::new()
    }
}

impl LineChart {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            x_label: None,
            y_label: None,
            legend: LegendPosition::UpperLeft,
            grid: Grid::Full,
            size: DEFAULT_SIZE,
        }
    }

    pub fn line(mut self, line: Line) -> Self {
        self.elements.push(Element::Line(line));
        self
    }

    pub fn band(mut self, band: Band) -> Self {
        self.elements.push(Element::Band(band));
        self
    }

    pub fn with_axis_labels(mut self, x: &str, y: &str) -> Self {
        self.x_label = Some(x.to_string());
        self.y_label = Some(y.to_string());
        self
    }

    pub fn with_legend(mut self, legend: LegendPosition) -> Self {
        self.legend = legend;
        self
    }

    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Legend labels in drawing order.
    pub fn labels(&self) -> Vec<&str> {
        self.elements
            .iter()
            .map(|e| match e {
                Element::Line(l) => l.label.as_str(),
                Element::Band(b) => b.label.as_str(),
            })
            .collect()
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.elements.iter().filter_map(|e| match e {
            Element::Line(l) => Some(l),
            Element::Band(_) => None,
        })
    }

    pub fn bands(&self) -> impl Iterator<Item = &Band> {
        self.elements.iter().filter_map(|e| match e {
            Element::Band(b) => Some(b),
            Element::Line(_) => None,
        })
    }

    pub fn legend(&self) -> LegendPosition {
        self.legend
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn axis_labels(&self) -> (Option<&str>, Option<&str>) {
        (self.x_label.as_deref(), self.y_label.as_deref())
    }

    /// Earliest and latest timestamp over all elements.
    pub fn x_range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let stamps = self
            .lines()
            .flat_map(|l| l.points.iter().map(|p| p.0))
            .chain(self.bands().flat_map(|b| b.timestamps.iter().copied()));
        let (mut lo, mut hi) = (None::<DateTime<Utc>>, None::<DateTime<Utc>>);
        for ts in stamps {
            lo = Some(lo.map_or(ts, |l| l.min(ts)));
            hi = Some(hi.map_or(ts, |h| h.max(ts)));
        }
        match (lo, hi) {
            (Some(lo), Some(hi)) if lo < hi => Ok((lo, hi)),
            (Some(lo), Some(_)) => Ok((lo - Duration::hours(1), lo + Duration::hours(1))),
            _ => Err(ForecastError::EmptyData),
        }
    }

    /// Value range over all elements, padded by 5% on each side.
    pub fn y_range(&self) -> (f64, f64) {
        let values = self
            .lines()
            .flat_map(|l| l.points.iter().map(|p| p.1))
            .chain(
                self.bands()
                    .flat_map(|b| b.lower.iter().chain(b.upper.iter()).copied()),
            )
            .filter(|v| v.is_finite());
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !lo.is_finite() {
            return (0.0, 1.0);
        }
        if hi - lo < 1e-12 {
            return (lo - 1.0, hi + 1.0);
        }
        let pad = 0.05 * (hi - lo);
        (lo - pad, hi + pad)
    }

    /// Render to `path`, creating parent directories and replacing any
    /// existing file.
    ///
    /// Fails with [`ForecastError::Plot`] when no system font can be loaded
    /// for the axis and legend text.
    pub fn render(&self, path: &Path) -> Result<()> {
        if !fonts_available() {
            return Err(ForecastError::Plot(
                "no sans-serif system font available for chart text".to_string(),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let is_svg = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("svg"))
            .unwrap_or(false);
        if is_svg {
            self.draw(SVGBackend::new(path, self.size).into_drawing_area())
        } else {
            self.draw(BitMapBackend::new(path, self.size).into_drawing_area())
        }
    }

    fn draw<DB: DrawingBackend>(&self, root: DrawingArea<DB, Shift>) -> Result<()> {
        root.fill(&WHITE).map_err(plot_err)?;
        let (x0, x1) = self.x_range()?;
        let (y0, y1) = self.y_range();

        let mut ctx = ChartBuilder::on(&root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(plot_err)?;

        let x_fmt = |ts: &DateTime<Utc>| ts.format("%m-%d %H:%M").to_string();
        let y_fmt = |v: &f64| format!("{:.2}", v);
        let mut mesh = ctx.configure_mesh();
        mesh.x_labels(8)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt);
        match self.grid {
            Grid::Off => {
                mesh.disable_mesh();
            }
            Grid::Full => {}
            Grid::Daily => {
                mesh.disable_x_mesh();
            }
        }
        if let Some(x) = &self.x_label {
            mesh.x_desc(x.as_str());
        }
        if let Some(y) = &self.y_label {
            mesh.y_desc(y.as_str());
        }
        mesh.draw().map_err(plot_err)?;

        if self.grid == Grid::Daily {
            let grid_style = BLACK.mix(0.2).stroke_width(1);
            for day in midnights(x0, x1) {
                ctx.draw_series(LineSeries::new(vec![(day, y0), (day, y1)], grid_style))
                    .map_err(plot_err)?;
            }
        }

        for element in &self.elements {
            match element {
                Element::Line(line) => {
                    let color = line.color;
                    ctx.draw_series(LineSeries::new(
                        line.points.iter().copied(),
                        color.stroke_width(2),
                    ))
                    .map_err(plot_err)?
                    .label(line.label.as_str())
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                    });
                }
                Element::Band(band) => {
                    let style = band.color.mix(0.25).filled();
                    let outline: Vec<(DateTime<Utc>, f64)> = band
                        .timestamps
                        .iter()
                        .copied()
                        .zip(band.lower.iter().copied())
                        .chain(
                            band.timestamps
                                .iter()
                                .copied()
                                .zip(band.upper.iter().copied())
                                .rev(),
                        )
                        .collect();
                    ctx.draw_series(std::iter::once(Polygon::new(outline, style)))
                        .map_err(plot_err)?
                        .label(band.label.as_str())
                        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], style));
                }
            }
        }

        let position = match self.legend {
            LegendPosition::UpperLeft => SeriesLabelPosition::UpperLeft,
            LegendPosition::UpperRight => SeriesLabelPosition::UpperRight,
        };
        ctx.configure_series_labels()
            .position(position)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
        Ok(())
    }
}

/// Whether a sans-serif system font can be loaded for text layout.
pub fn fonts_available() -> bool {
    FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Normal)
        .box_size("TEC")
        .is_ok()
}

fn plot_err<E: std::fmt::Display>(e: E) -> ForecastError {
    ForecastError::Plot(e.to_string())
}

/// Midnights strictly inside `(start, end]`, plus `start` itself if it is one.
fn midnights(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut day = match start.duration_trunc(Duration::days(1)) {
        Ok(d) if d == start => d,
        Ok(d) => d + Duration::days(1),
        Err(_) => return Vec::new(),
    };
    let mut out = Vec::new();
    while day <= end {
        out.push(day);
        day += Duration::days(1);
    }
    out
}

fn series_points(series: &TimeSeries) -> Vec<(DateTime<Utc>, f64)> {
    series.iter().collect()
}

/// A single series, as used for the raw training data chart.
pub fn series_chart(series: &TimeSeries, label: &str) -> LineChart {
    LineChart::new()
        .line(Line {
            label: label.to_string(),
            points: series_points(series),
            color: PALETTE[0],
        })
        .with_legend(LegendPosition::UpperLeft)
        .with_grid(Grid::Full)
}

/// Observed history followed by a forecast's median and interval bands.
///
/// Bands are labelled `"<level>% forecast interval"` and drawn widest first.
pub fn forecast_chart(
    history: &TimeSeries,
    forecast: &SampleForecast,
    levels: &[f64],
) -> Result<LineChart> {
    let mut levels = levels.to_vec();
    levels.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let summary = forecast.summarize(&levels)?;

    let mut chart = LineChart::new()
        .line(Line {
            label: "actual data".to_string(),
            points: series_points(history),
            color: PALETTE[0],
        })
        .line(Line {
            label: "median forecast".to_string(),
            points: summary
                .timestamps()
                .iter()
                .copied()
                .zip(summary.point().iter().copied())
                .collect(),
            color: PALETTE[2],
        });
    for interval in summary.intervals() {
        chart = chart.band(Band {
            label: format!("{}% forecast interval", interval.level),
            timestamps: summary.timestamps().to_vec(),
            lower: interval.lower.clone(),
            upper: interval.upper.clone(),
            color: PALETTE[2],
        });
    }
    Ok(chart
        .with_legend(LegendPosition::UpperLeft)
        .with_grid(Grid::Full))
}

/// Every column of a comparison table as one line, labelled by column label.
pub fn comparison_chart(table: &ComparisonTable) -> LineChart {
    let mut chart = LineChart::new();
    for (i, column) in table.columns().iter().enumerate() {
        chart = chart.line(Line {
            label: column.label.clone(),
            points: table
                .index()
                .iter()
                .copied()
                .zip(column.values.iter().copied())
                .collect(),
            color: PALETTE[i % PALETTE.len()],
        });
    }
    chart
        .with_axis_labels("Days", "TEC")
        .with_legend(LegendPosition::UpperRight)
        .with_grid(Grid::Daily)
        .with_size(1000, 700)
}
