//! PNG rendering of observed vs. predicted discharge.
//!
//! The x axis is the row index (dates are categorical), the y axis is
//! discharge. No text is drawn; series are told apart by colour and the legend
//! swatches follow the draw order: observed, train fit, test forecast.

use std::path::Path;

use image::{Rgb, RgbImage};
use serde::{Serialize, Deserialize};

use crate::error::Result;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const MINOR_GRID: Rgb<u8> = Rgb([236, 236, 236]);
const MAJOR_GRID: Rgb<u8> = Rgb([200, 200, 200]);
const OBSERVED: Rgb<u8> = Rgb([0, 0, 255]);
const TRAIN_FIT: Rgb<u8> = Rgb([255, 0, 0]);
const TEST_FORECAST: Rgb<u8> = Rgb([0, 128, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    /// Rows between darker vertical grid lines.
    pub major_tick: usize,
    /// Rows between light vertical grid lines.
    pub minor_tick: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig { width: 2400, height: 1000, major_tick: 100, minor_tick: 20 }
    }
}

/// The three series of a station plot. `train_fit` covers rows
/// `0..train_fit.len()` and `test_forecast` the rows after it.
#[derive(Debug, Clone, Copy)]
pub struct PredictionPlot<'a> {
    pub observed: &'a [f64],
    pub train_fit: &'a [f64],
    pub test_forecast: &'a [f64],
}

/// Renders `plot` and writes it as a PNG to `path`.
pub fn plot_predictions(path: &Path, plot: &PredictionPlot<'_>, config: &PlotConfig) -> Result<()> {
    render(plot, config).save(path)?;
    Ok(())
}

/// Renders `plot` into an in-memory image.
pub fn render(plot: &PredictionPlot<'_>, config: &PlotConfig) -> RgbImage {
    let mut canvas = Canvas::new(config.width.max(64), config.height.max(48));
    let n = plot.observed.len().max(plot.train_fit.len() + plot.test_forecast.len());

    let (y_min, y_max) = value_range(
        plot.observed.iter().chain(plot.train_fit).chain(plot.test_forecast),
    );
    let frame = canvas.plot_area();
    let axes = Axes { frame, n, y_min, y_max };

    // Grid first so the series draw over it.
    if config.minor_tick > 0 {
        for row in (0..n).step_by(config.minor_tick) {
            canvas.vline(axes.x(row as f64), frame, MINOR_GRID);
        }
    }
    if config.major_tick > 0 {
        for row in (0..n).step_by(config.major_tick) {
            canvas.vline(axes.x(row as f64), frame, MAJOR_GRID);
        }
    }
    for k in 1..5 {
        let y = frame.top + (frame.bottom - frame.top) * k as f64 / 5.0;
        canvas.hline(y, frame, MINOR_GRID);
    }

    let observed = axes.points(0, plot.observed);
    let train = axes.points(0, plot.train_fit);
    let test = axes.points(plot.train_fit.len(), plot.test_forecast);

    canvas.stroke(&observed, OBSERVED, 3, 0.3);
    canvas.stroke(&train, TRAIN_FIT, 1, 1.0);
    canvas.stroke(&test, TEST_FORECAST, 1, 1.0);

    canvas.rect(frame, BLACK);
    canvas.legend(frame, &[(OBSERVED, 3, 0.3), (TRAIN_FIT, 1, 1.0), (TEST_FORECAST, 1, 1.0)]);
    canvas.image
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

struct Axes {
    frame: Frame,
    n: usize,
    y_min: f64,
    y_max: f64,
}

impl Axes {
    fn x(&self, row: f64) -> f64 {
        let span = (self.n.max(2) - 1) as f64;
        self.frame.left + (self.frame.right - self.frame.left) * row / span
    }

    fn y(&self, value: f64) -> f64 {
        let t = (value - self.y_min) / (self.y_max - self.y_min);
        self.frame.bottom - (self.frame.bottom - self.frame.top) * t
    }

    /// Pixel coordinates for `values` starting at row `offset`; non-finite
    /// values become `None` and break the line.
    fn points(&self, offset: usize, values: &[f64]) -> Vec<Option<(f64, f64)>> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| v.is_finite().then(|| (self.x((offset + i) as f64), self.y(*v))))
            .collect()
    }
}

/// Finite min/max padded by 5%; a flat or empty series gets a unit range.
fn value_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

// ---------------------------------------------------------------------------
// Raster canvas
// ---------------------------------------------------------------------------

struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Canvas {
        Canvas { image: RgbImage::from_pixel(width, height, WHITE) }
    }

    fn plot_area(&self) -> Frame {
        let (w, h) = (self.image.width() as f64, self.image.height() as f64);
        Frame {
            left: (w * 0.05).round(),
            top: (h * 0.06).round(),
            right: (w * 0.98).round(),
            bottom: (h * 0.90).round(),
        }
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height()
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgb<u8>, alpha: f64) {
        if !self.in_bounds(x, y) {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
            let under = px.0[c] as f64;
            px.0[c] = (under + (color.0[c] as f64 - under) * alpha).round() as u8;
        }
    }

    fn vline(&mut self, x: f64, frame: Frame, color: Rgb<u8>) {
        let x = x.round() as i64;
        for y in frame.top as i64..=frame.bottom as i64 {
            self.blend(x, y, color, 1.0);
        }
    }

    fn hline(&mut self, y: f64, frame: Frame, color: Rgb<u8>) {
        let y = y.round() as i64;
        for x in frame.left as i64..=frame.right as i64 {
            self.blend(x, y, color, 1.0);
        }
    }

    fn rect(&mut self, frame: Frame, color: Rgb<u8>) {
        self.vline(frame.left, frame, color);
        self.vline(frame.right, frame, color);
        self.hline(frame.top, frame, color);
        self.hline(frame.bottom, frame, color);
    }

    /// Draws a polyline `width` pixels wide. Every covered pixel is blended
    /// exactly once, so overlapping segments do not darken a translucent line.
    fn stroke(&mut self, points: &[Option<(f64, f64)>], color: Rgb<u8>, width: u32, alpha: f64) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let mut covered = vec![false; (w * h) as usize];
        let half = (width as i64 - 1) / 2;
        let extra = (width as i64 - 1) - half;

        let mut stamp = |cx: i64, cy: i64| {
            for y in cy - half..=cy + extra {
                for x in cx - half..=cx + extra {
                    if x >= 0 && y >= 0 && x < w && y < h {
                        covered[(y * w + x) as usize] = true;
                    }
                }
            }
        };

        for pair in points.windows(2) {
            match (pair[0], pair[1]) {
                (Some(a), Some(b)) => bresenham(a, b, &mut stamp),
                (Some(a), None) => stamp(a.0.round() as i64, a.1.round() as i64),
                _ => {}
            }
        }
        if let Some(Some(last)) = points.last() {
            stamp(last.0.round() as i64, last.1.round() as i64);
        }

        for (i, hit) in covered.into_iter().enumerate() {
            if hit {
                self.blend(i as i64 % w, i as i64 / w, color, alpha);
            }
        }
    }

    /// Legend box in the upper-right corner of the plot area with one swatch
    /// per series.
    fn legend(&mut self, frame: Frame, entries: &[(Rgb<u8>, u32, f64)]) {
        let row_h = ((frame.bottom - frame.top) * 0.06).max(8.0);
        let box_w = ((frame.right - frame.left) * 0.08).max(24.0);
        let right = frame.right - row_h * 0.5;
        let left = right - box_w;
        let top = frame.top + row_h * 0.5;
        let bottom = top + row_h * entries.len() as f64;

        for y in top as i64..=bottom as i64 {
            for x in left as i64..=right as i64 {
                self.blend(x, y, WHITE, 1.0);
            }
        }
        self.rect(Frame { left, top, right, bottom }, MAJOR_GRID);

        for (i, (color, width, alpha)) in entries.iter().enumerate() {
            let y = top + row_h * (i as f64 + 0.5);
            let swatch = [
                Some((left + box_w * 0.15, y)),
                Some((left + box_w * 0.85, y)),
            ];
            self.stroke(&swatch, *color, *width, *alpha);
        }
    }
}

/// Calls `plot` for every pixel on the segment from `a` to `b`.
fn bresenham<F: FnMut(i64, i64)>(a: (f64, f64), b: (f64, f64), plot: &mut F) {
    let (mut x0, mut y0) = (a.0.round() as i64, a.1.round() as i64);
    let (x1, y1) = (b.0.round() as i64, b.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        plot(x0, y0);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> PlotConfig {
        PlotConfig { width: 200, height: 100, major_tick: 10, minor_tick: 2 }
    }

    #[test]
    fn renders_requested_size_with_series_colours() {
        let observed: Vec<f64> = (0..40).map(|i| (i as f64 * 0.3).sin() * 10.0 + 20.0).collect();
        let plot = PredictionPlot {
            observed: &observed,
            train_fit: &observed[..30],
            test_forecast: &observed[30..],
        };
        let img = render(&plot, &small());
        assert_eq!(img.dimensions(), (200, 100));
        assert!(img.pixels().any(|p| *p == TRAIN_FIT));
        assert!(img.pixels().any(|p| *p == TEST_FORECAST));
    }

    #[test]
    fn translucent_stroke_blends_once() {
        let mut canvas = Canvas::new(20, 20);
        // A line that doubles back over itself.
        let pts = [Some((2.0, 10.0)), Some((17.0, 10.0)), Some((2.0, 10.0))];
        canvas.stroke(&pts, OBSERVED, 3, 0.3);
        let px = canvas.image.get_pixel(10, 10);
        assert_eq!(*px, Rgb([179, 179, 255]));
    }

    #[test]
    fn nan_breaks_the_line() {
        let mut canvas = Canvas::new(30, 10);
        let pts = [Some((0.0, 5.0)), None, Some((29.0, 5.0))];
        canvas.stroke(&pts, BLACK, 1, 1.0);
        assert_eq!(*canvas.image.get_pixel(15, 5), WHITE);
        assert_eq!(*canvas.image.get_pixel(0, 5), BLACK);
        assert_eq!(*canvas.image.get_pixel(29, 5), BLACK);
    }

    #[test]
    fn flat_series_gets_unit_range() {
        assert_eq!(value_range([3.0, 3.0].iter()), (2.0, 4.0));
        assert_eq!(value_range([f64::NAN].iter()), (0.0, 1.0));
        let (lo, hi) = value_range([0.0, 10.0].iter());
        assert!((lo + 0.5).abs() < 1e-12 && (hi - 10.5).abs() < 1e-12);
    }

    #[test]
    fn writes_a_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.png");
        let obs = [1.0, 2.0, 3.0, 2.0];
        let plot = PredictionPlot { observed: &obs, train_fit: &obs[..3], test_forecast: &obs[3..] };
        plot_predictions(&path, &plot, &small()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
