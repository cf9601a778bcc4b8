use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut},
    rect::Rect,
};
use itertools::{Itertools, MinMaxResult};
use rand::Rng;
use rusttype::{Font, Scale};
use thiserror::Error;

use crate::library::{PlotCfg, Prediction};

pub type RgbImgBuf = ImageBuffer<Rgb<u8>, Vec<u8>>;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([31, 119, 180]);
pub const ORANGE: Rgb<u8> = Rgb([255, 127, 14]);
pub const GREEN: Rgb<u8> = Rgb([44, 160, 44]);
pub const PALE_BLUE: Rgb<u8> = Rgb([197, 211, 231]);
pub const TRACE_BLUE: Rgb<u8> = Rgb([200, 215, 235]);

const MARGIN_LEFT: u32 = 90;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 60;
const MARGIN_BOTTOM: u32 = 70;

const TITLE_SCALE: f32 = 28.0;
const LABEL_SCALE: f32 = 20.0;
const TICK_SCALE: f32 = 16.0;

#[derive(Error, Debug, Clone)]
pub enum PlotError {
    #[error("Nothing to plot")]
    EmptyPlotError,

    #[error("Plot of {width}x{height} pixels is too small to hold its margins")]
    PlotSizeError { width: u32, height: u32 },

    #[error("Failed to save plot to {path}: {src}")]
    SaveError { src: String, path: PathBuf },
}

/// A fixed-size raster chart mapping data coordinates into a plotting area surrounded by
/// margins. Text is only drawn when a font is available.
pub struct Chart<'f> {
    buf: RgbImgBuf,
    x_range: (f64, f64),
    y_range: (f64, f64),
    font: Option<&'f Font<'f>>,
}

impl<'f> Chart<'f> {
    pub fn new(
        cfg: &PlotCfg,
        x_range: (f64, f64),
        y_range: (f64, f64),
        font: Option<&'f Font<'f>>,
    ) -> Result<Self, PlotError> {
        if cfg.width <= MARGIN_LEFT + MARGIN_RIGHT || cfg.height <= MARGIN_TOP + MARGIN_BOTTOM {
            return Err(PlotError::PlotSizeError {
                width: cfg.width,
                height: cfg.height,
            });
        }

        let buf = ImageBuffer::from_pixel(cfg.width, cfg.height, WHITE);

        Ok(Self {
            buf,
            x_range: widen(x_range),
            y_range: widen(y_range),
            font,
        })
    }

    fn plot_width(&self) -> f64 {
        (self.buf.width() - MARGIN_LEFT - MARGIN_RIGHT) as f64
    }

    fn plot_height(&self) -> f64 {
        (self.buf.height() - MARGIN_TOP - MARGIN_BOTTOM) as f64
    }

    fn px_x(&self, x: f64) -> f64 {
        let (lo, hi) = self.x_range;
        MARGIN_LEFT as f64 + (x - lo) / (hi - lo) * self.plot_width()
    }

    fn px_y(&self, y: f64) -> f64 {
        let (lo, hi) = self.y_range;
        MARGIN_TOP as f64 + (hi - y) / (hi - lo) * self.plot_height()
    }

    pub fn to_px(&self, x: f64, y: f64) -> (f32, f32) {
        (self.px_x(x) as f32, self.px_y(y) as f32)
    }

    fn text(&mut self, x: u32, y: u32, size: f32, text: &str) {
        if let Some(font) = self.font {
            draw_text_mut(&mut self.buf, BLACK, x, y, Scale::uniform(size), font, text);
        }
    }

    /// Frame the plotting area and label the ends of both axes.
    pub fn axes(&mut self) {
        let rect = Rect::at(MARGIN_LEFT as i32, MARGIN_TOP as i32)
            .of_size(self.plot_width() as u32 + 1, self.plot_height() as u32 + 1);
        draw_hollow_rect_mut(&mut self.buf, rect, BLACK);

        let bottom = self.buf.height() - MARGIN_BOTTOM;
        let right = self.buf.width() - MARGIN_RIGHT;
        let (x_lo, x_hi) = self.x_range;
        let (y_lo, y_hi) = self.y_range;

        self.text(MARGIN_LEFT, bottom + 4, TICK_SCALE, &tick_label(x_lo));
        self.text(right.saturating_sub(60), bottom + 4, TICK_SCALE, &tick_label(x_hi));
        self.text(4, MARGIN_TOP, TICK_SCALE, &tick_label(y_hi));
        self.text(4, bottom - TICK_SCALE as u32, TICK_SCALE, &tick_label(y_lo));
    }

    pub fn title(&mut self, title: &str) {
        self.text(MARGIN_LEFT, 16, TITLE_SCALE, title);
    }

    pub fn labels(&mut self, x_label: &str, y_label: &str) {
        let x_label_y = self.buf.height() - MARGIN_BOTTOM + 30;
        self.text(MARGIN_LEFT + self.plot_width() as u32 / 3, x_label_y, LABEL_SCALE, x_label);
        self.text(MARGIN_LEFT + 6, MARGIN_TOP + 6, LABEL_SCALE, y_label);
    }

    pub fn line(&mut self, xs: &[f64], ys: &[f64], color: Rgb<u8>) {
        let points = xs.iter().zip(ys).map(|(&x, &y)| self.to_px(x, y)).collect::<Vec<_>>();
        for (start, end) in points.into_iter().tuple_windows() {
            draw_line_segment_mut(&mut self.buf, start, end, color);
        }
    }

    pub fn points(&mut self, xs: &[f64], ys: &[f64], color: Rgb<u8>, radius: i32) {
        for (&x, &y) in xs.iter().zip(ys) {
            let (px, py) = self.to_px(x, y);
            draw_filled_circle_mut(&mut self.buf, (px.round() as i32, py.round() as i32), radius, color);
        }
    }

    /// Shade the area between `lower` and `upper`, blending `color` over what is already drawn.
    /// Each pixel is blended at most once, however many points share its column.
    pub fn band(&mut self, xs: &[f64], lower: &[f64], upper: &[f64], color: Rgb<u8>, alpha: f32) {
        let (width, height) = self.buf.dimensions();
        let segments = xs.iter().zip(lower).zip(upper).map(|((&x, &lo), &hi)| (x, lo, hi));

        //vertical extent to shade in each pixel column.
        let mut spans: Vec<Option<(u32, u32)>> = vec![None; width as usize];

        for ((x0, lo0, hi0), (x1, lo1, hi1)) in segments.tuple_windows() {
            let px0 = self.px_x(x0).round().max(0.0) as u32;
            let px1 = self.px_x(x1).round().max(0.0) as u32;

            for px in px0..=px1.min(width - 1) {
                let t = if px1 > px0 {
                    (px - px0) as f64 / (px1 - px0) as f64
                } else {
                    0.0
                };
                let lo = self.px_y(lo0 + t * (lo1 - lo0));
                let hi = self.px_y(hi0 + t * (hi1 - hi0));
                let top = hi.min(lo).round().max(0.0) as u32;
                let bottom = (hi.max(lo).round().max(0.0) as u32).min(height - 1);

                let span = &mut spans[px as usize];
                *span = match *span {
                    Some((prev_top, prev_bottom)) => Some((prev_top.min(top), prev_bottom.max(bottom))),
                    None => Some((top, bottom)),
                };
            }
        }

        for (px, span) in spans.into_iter().enumerate() {
            if let Some((top, bottom)) = span {
                for py in top..=bottom {
                    blend(self.buf.get_pixel_mut(px as u32, py), color, alpha);
                }
            }
        }
    }

    pub fn into_image(self) -> RgbImgBuf {
        self.buf
    }
}

fn blend(pixel: &mut Rgb<u8>, color: Rgb<u8>, alpha: f32) {
    for (channel, target) in pixel.0.iter_mut().zip(color.0.iter()) {
        *channel = (*channel as f32 * (1.0 - alpha) + *target as f32 * alpha).round() as u8;
    }
}

fn tick_label(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v)
    } else {
        format!("{:.2}", v)
    }
}

// a zero-width range cannot be mapped to pixels.
fn widen((lo, hi): (f64, f64)) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

/// Smallest and largest finite values, or `None` if there are none.
pub fn bounds<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(f64, f64)> {
    match values.into_iter().filter(|v| v.is_finite()).minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => None,
        MinMaxResult::OneElement(&v) => Some((v, v)),
        MinMaxResult::MinMax(&lo, &hi) => Some((lo, hi)),
    }
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let pad = ((hi - lo) * 0.05).max(0.1);
    (lo - pad, hi + pad)
}

pub fn save_plot(img: &RgbImgBuf, path: impl AsRef<Path>) -> Result<(), PlotError> {
    let path = path.as_ref();
    img.save(path).map_err(|e| PlotError::SaveError {
        src: e.to_string(),
        path: path.to_path_buf(),
    })?;

    info!(target: "plot", "Wrote plot to {}", path.display());
    Ok(())
}

/// Per-timestep mean over a set of equally weighted sequences, truncated to the shortest one.
pub fn mean_trace<S: AsRef<[i64]>>(sequences: &[S]) -> Vec<f64> {
    let len = sequences.iter().map(|s| s.as_ref().len()).min().unwrap_or(0);
    let n = sequences.len() as f64;

    (0..len)
        .map(|i| sequences.iter().map(|s| s.as_ref()[i] as f64).sum::<f64>() / n)
        .collect()
}

/// Resample the annotators with replacement `n_boot` times and return the mean trace of each
/// resample.
pub fn bootstrap_traces<R: Rng + ?Sized>(samples: &[Vec<i64>], n_boot: usize, rng: &mut R) -> Vec<Vec<f64>> {
    if samples.is_empty() {
        return vec![];
    }

    (0..n_boot)
        .map(|_| {
            let resample = (0..samples.len())
                .map(|_| samples[rng.gen_range(0..samples.len())].as_slice())
                .collect::<Vec<_>>();
            mean_trace(&resample)
        })
        .collect()
}

pub fn plot_bootstrap<R: Rng + ?Sized>(
    samples: &[Vec<i64>],
    cfg: &PlotCfg,
    font: Option<&Font>,
    rng: &mut R,
) -> Result<RgbImgBuf, PlotError> {
    let mean = mean_trace(samples);
    if mean.is_empty() {
        return Err(PlotError::EmptyPlotError);
    }
    let traces = bootstrap_traces(samples, cfg.n_boot, rng);
    let xs = (0..mean.len()).map(|i| i as f64).collect::<Vec<_>>();

    let (y_lo, y_hi) = bounds(samples.iter().flatten().map(|&v| v as f64).collect::<Vec<_>>().iter())
        .ok_or(PlotError::EmptyPlotError)?;

    let mut chart = Chart::new(cfg, (0.0, (mean.len() - 1) as f64), padded(y_lo, y_hi), font)?;
    for trace in &traces {
        chart.line(&xs, trace, TRACE_BLUE);
    }
    chart.line(&xs, &mean, BLUE);
    chart.axes();
    chart.title("Ratings with Bootstrap resampling");
    chart.labels("Time (every 2 seconds)", "Rating");

    Ok(chart.into_image())
}

/// Observations, posterior mean and a confidence band of `sigmas` standard deviations.
pub fn plot_gp(
    observations: (&[f64], &[f64]),
    grid: &[f64],
    prediction: &Prediction,
    sigmas: f64,
    cfg: &PlotCfg,
    font: Option<&Font>,
) -> Result<RgbImgBuf, PlotError> {
    let (obs_x, obs_y) = observations;
    let mean = prediction.mean.to_vec();
    let std_dev = prediction.std_dev();
    let lower = mean.iter().zip(std_dev.iter()).map(|(m, s)| m - sigmas * s).collect::<Vec<_>>();
    let upper = mean.iter().zip(std_dev.iter()).map(|(m, s)| m + sigmas * s).collect::<Vec<_>>();

    let x_range = bounds(grid.iter().chain(obs_x)).ok_or(PlotError::EmptyPlotError)?;
    let (y_lo, y_hi) = bounds(lower.iter().chain(&upper).chain(obs_y)).ok_or(PlotError::EmptyPlotError)?;

    let mut chart = Chart::new(cfg, x_range, padded(y_lo, y_hi), font)?;
    chart.band(grid, &lower, &upper, PALE_BLUE, 0.5);
    chart.line(grid, &mean, BLUE);
    chart.points(obs_x, obs_y, BLACK, 2);
    chart.axes();
    chart.title("Gaussian Process fit");
    chart.labels("Frame", "Rating");

    Ok(chart.into_image())
}

/// Mean with `mean - variance` and `mean + variance` bounds, shaded between.
pub fn plot_prediction_band(
    frames: &[f64],
    prediction: &Prediction,
    cfg: &PlotCfg,
    font: Option<&Font>,
) -> Result<RgbImgBuf, PlotError> {
    let mean = prediction.mean.to_vec();
    let lower = (&prediction.mean - &prediction.variance).to_vec();
    let upper = (&prediction.mean + &prediction.variance).to_vec();

    let x_range = bounds(frames).ok_or(PlotError::EmptyPlotError)?;
    let (y_lo, y_hi) = bounds(lower.iter().chain(&upper)).ok_or(PlotError::EmptyPlotError)?;

    let mut chart = Chart::new(cfg, x_range, padded(y_lo, y_hi), font)?;
    chart.band(frames, &upper, &lower, PALE_BLUE, 0.5);
    chart.line(frames, &mean, BLUE);
    chart.line(frames, &lower, ORANGE);
    chart.line(frames, &upper, GREEN);
    chart.axes();
    chart.title("Predicted Frame Importance");
    chart.labels("Frame", "Frame Importance");

    Ok(chart.into_image())
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn small_cfg() -> PlotCfg {
        PlotCfg {
            width: 320,
            height: 240,
            n_boot: 20,
            seed: 7,
        }
    }

    #[test]
    fn test_mean_trace() {
        let samples = vec![vec![1, 2, 3], vec![3, 4, 5]];
        assert_eq!(mean_trace(&samples), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_mean_trace_ragged_truncates() {
        let samples = vec![vec![1, 2, 3], vec![3, 4]];
        assert_eq!(mean_trace(&samples), vec![2.0, 3.0]);
    }

    #[test]
    fn test_bootstrap_single_annotator() {
        let samples = vec![vec![1, 5, 2, 4]];
        let mut rng = StdRng::seed_from_u64(1);

        let traces = bootstrap_traces(&samples, 10, &mut rng);
        assert_eq!(traces.len(), 10);
        assert!(traces.iter().all(|t| t == &vec![1.0, 5.0, 2.0, 4.0]));
    }

    #[test]
    fn test_bootstrap_traces_stay_within_annotators() {
        let samples = vec![vec![0, 0], vec![10, 10], vec![4, 4]];
        let mut rng = StdRng::seed_from_u64(3);

        for trace in bootstrap_traces(&samples, 50, &mut rng) {
            assert_eq!(trace.len(), 2);
            assert!(trace.iter().all(|v| (0.0..=10.0).contains(v)));
        }
    }

    #[test]
    fn test_bootstrap_no_annotators() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(bootstrap_traces(&[], 10, &mut rng).is_empty());
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds(&[3.0, -1.0, f64::NAN, 2.0]), Some((-1.0, 3.0)));
        assert_eq!(bounds(&[1.5]), Some((1.5, 1.5)));
        assert_eq!(bounds(&[] as &[f64]), None);
    }

    #[test]
    fn test_chart_coordinates() {
        let cfg = small_cfg();
        let chart = Chart::new(&cfg, (0.0, 10.0), (0.0, 1.0), None).unwrap();

        let (x0, y0) = chart.to_px(0.0, 0.0);
        let (x1, y1) = chart.to_px(10.0, 1.0);
        assert_eq!(x0, MARGIN_LEFT as f32);
        assert_eq!(y0, (cfg.height - MARGIN_BOTTOM) as f32);
        assert_eq!(x1, (cfg.width - MARGIN_RIGHT) as f32);
        assert_eq!(y1, MARGIN_TOP as f32);
    }

    #[test]
    fn test_chart_too_small() {
        let cfg = PlotCfg {
            width: 50,
            height: 50,
            ..small_cfg()
        };
        assert!(matches!(
            Chart::new(&cfg, (0.0, 1.0), (0.0, 1.0), None),
            Err(PlotError::PlotSizeError { .. })
        ));
    }

    #[test]
    fn test_band_blends_between_bounds() {
        let cfg = small_cfg();
        let mut chart = Chart::new(&cfg, (0.0, 10.0), (0.0, 10.0), None).unwrap();
        chart.band(&[0.0, 10.0], &[4.0, 4.0], &[6.0, 6.0], BLACK, 0.5);

        let (px, inside) = chart.to_px(5.0, 5.0);
        let (_, outside) = chart.to_px(5.0, 9.0);
        let img = chart.into_image();

        assert_eq!(img.get_pixel(px as u32, inside as u32), &Rgb([128, 128, 128]));
        assert_eq!(img.get_pixel(px as u32, outside as u32), &WHITE);
    }

    #[test]
    fn test_band_blends_joint_columns_once() {
        let cfg = small_cfg();
        let mut chart = Chart::new(&cfg, (0.0, 10.0), (0.0, 10.0), None).unwrap();
        chart.band(&[0.0, 5.0, 10.0], &[4.0; 3], &[6.0; 3], BLACK, 0.5);

        let (joint, y) = chart.to_px(5.0, 5.0);
        let (mid, _) = chart.to_px(2.5, 5.0);
        let img = chart.into_image();

        assert_eq!(img.get_pixel(joint as u32, y as u32), &Rgb([128, 128, 128]));
        assert_eq!(img.get_pixel(mid as u32, y as u32), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_band_dense_points_blend_once() {
        //many more points than pixel columns.
        let cfg = small_cfg();
        let xs = (0..1000).map(|i| i as f64 / 100.0).collect::<Vec<_>>();
        let lower = vec![4.0; xs.len()];
        let upper = vec![6.0; xs.len()];

        let mut chart = Chart::new(&cfg, (0.0, 10.0), (0.0, 10.0), None).unwrap();
        chart.band(&xs, &lower, &upper, BLACK, 0.5);

        let (px, py) = chart.to_px(5.0, 5.0);
        let img = chart.into_image();

        assert_eq!(img.get_pixel(px as u32, py as u32), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_plot_bootstrap_size() {
        let cfg = small_cfg();
        let samples = vec![vec![1, 2, 3, 2], vec![2, 3, 4, 3]];
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let img = plot_bootstrap(&samples, &cfg, None, &mut rng).unwrap();
        assert_eq!(img.dimensions(), (320, 240));
    }

    #[test]
    fn test_plot_bootstrap_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let samples: Vec<Vec<i64>> = vec![vec![]];
        assert!(matches!(
            plot_bootstrap(&samples, &small_cfg(), None, &mut rng),
            Err(PlotError::EmptyPlotError)
        ));
    }

    #[test]
    fn test_plot_prediction_band_saves_png() {
        let cfg = small_cfg();
        let prediction = Prediction {
            mean: array![1.0, 2.0, 1.5],
            variance: array![0.5, 0.4, 0.6],
        };
        let img = plot_prediction_band(&[0.0, 1.0, 2.0], &prediction, &cfg, None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.png");
        save_plot(&img, &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), (320, 240));
    }

    #[test]
    fn test_save_to_missing_dir_fails() {
        let img: RgbImgBuf = ImageBuffer::new(4, 4);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("x.png");

        assert!(matches!(save_plot(&img, &path), Err(PlotError::SaveError { .. })));
    }
}
