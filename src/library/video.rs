use std::{fmt, path::Path};

use itertools::Itertools;
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, SeedableRng};
use rusttype::Font;
use thiserror::Error;

use crate::library::{
    definitions::{CONFIDENCE_BAND_SIGMAS, FRAMES_PER_SAMPLE, GP_PLOT_POINTS},
    plotting::{self, PlotError},
    GaussianProcess, GpCfg, GpError, PlotCfg, Prediction, RbfKernel, VideoRecord,
};

#[derive(Error, Debug, Clone)]
pub enum VideoError {
    #[error("Video {0} has no ratings")]
    NoRatingsError(String),

    #[error("No Gaussian Process has been fitted for video {0}")]
    GpNotFittedError(String),

    #[error("Gaussian Process failure for video {id}")]
    GpError {
        id: String,
        #[source]
        source: GpError,
    },

    #[error("Failed to plot video {id}")]
    PlotError {
        id: String,
        #[source]
        source: PlotError,
    },
}

/// Keep one rating out of every `FRAMES_PER_SAMPLE`, starting from the first frame.
pub fn downsample(ratings: &[i64]) -> Vec<i64> {
    ratings.iter().step_by(FRAMES_PER_SAMPLE).copied().collect()
}

/// Whether the annotators rated different numbers of frames.
pub fn is_ragged(ratings: &[Vec<i64>]) -> bool {
    !ratings.iter().map(Vec::len).all_equal()
}

/// A video, every annotator's ratings for it, and the Gaussian Process modelling them.
#[derive(Debug, Clone)]
pub struct Video {
    record: VideoRecord,
    ratings: Vec<Vec<i64>>,

    samples: Vec<Vec<i64>>,
    sample_locations: Array2<f64>,
    sample_data: Array2<f64>,

    gp: Option<GaussianProcess>,
    gp_mu: Option<Array1<f64>>,
    gp_var: Option<Array1<f64>>,
}

impl Video {
    pub fn new(record: VideoRecord, ratings: Vec<Vec<i64>>) -> Result<Self, VideoError> {
        if ratings.is_empty() {
            return Err(VideoError::NoRatingsError(record.id));
        }

        let samples = ratings.iter().map(|r| downsample(r)).collect::<Vec<_>>();

        if is_ragged(&ratings) {
            warn!(
                "Annotators of video {} rated different numbers of frames: {:?}",
                record.id,
                ratings.iter().map(Vec::len).collect::<Vec<_>>()
            );
        }

        //each annotator contributes one (location, value) pair per sample.
        let locations = samples
            .iter()
            .flat_map(|sample| (0..sample.len()).map(|i| (i * FRAMES_PER_SAMPLE) as f64))
            .collect::<Vec<_>>();
        let values = samples.iter().flatten().map(|&v| v as f64).collect::<Vec<_>>();

        let sample_locations = Array2::from_shape_vec((locations.len(), 1), locations).unwrap_or_else(|_| unreachable!());
        let sample_data = Array2::from_shape_vec((values.len(), 1), values).unwrap_or_else(|_| unreachable!());

        trace!(target: "video",
            "Video {}: {} annotators, {} samples",
            record.id,
            ratings.len(),
            sample_data.nrows()
        );

        Ok(Self {
            record,
            ratings,
            samples,
            sample_locations,
            sample_data,
            gp: None,
            gp_mu: None,
            gp_var: None,
        })
    }

    pub fn record(&self) -> &VideoRecord {
        &self.record
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn ratings(&self) -> &[Vec<i64>] {
        &self.ratings
    }

    pub fn samples(&self) -> &[Vec<i64>] {
        &self.samples
    }

    /// Sample locations in frames, one row per sample, annotator after annotator.
    pub fn x(&self) -> &Array2<f64> {
        &self.sample_locations
    }

    /// Sample values, aligned with `x`.
    pub fn y(&self) -> &Array2<f64> {
        &self.sample_data
    }

    pub fn gp(&self) -> Option<&GaussianProcess> {
        self.gp.as_ref()
    }

    pub fn gp_mu(&self) -> Option<&Array1<f64>> {
        self.gp_mu.as_ref()
    }

    pub fn gp_var(&self) -> Option<&Array1<f64>> {
        self.gp_var.as_ref()
    }

    /// Last sample location, i.e. the number of frames covered by the samples.
    pub fn sampled_frames(&self) -> usize {
        self.sample_locations.iter().fold(0.0f64, |a, &b| a.max(b)) as usize
    }

    fn gp_err(&self, source: GpError) -> VideoError {
        VideoError::GpError {
            id: self.record.id.clone(),
            source,
        }
    }

    fn plot_err(&self, source: PlotError) -> VideoError {
        VideoError::PlotError {
            id: self.record.id.clone(),
            source,
        }
    }

    fn fitted_gp(&self) -> Result<&GaussianProcess, VideoError> {
        self.gp
            .as_ref()
            .ok_or_else(|| VideoError::GpNotFittedError(self.record.id.clone()))
    }

    /// Fit a Gaussian Process with an RBF kernel to the samples. Any earlier fit and its
    /// predictions are discarded.
    pub fn fit_gaussian_process(&mut self, cfg: &GpCfg) -> Result<(), VideoError> {
        let kernel = RbfKernel::new(cfg.kernel_variance, cfg.lengthscale).map_err(|e| self.gp_err(e))?;
        let gp = GaussianProcess::fit(self.x(), self.y(), kernel, cfg.noise_variance)
            .map_err(|e| self.gp_err(e))?;

        debug!(target: "video",
            "Fitted video {}: log likelihood {:.3}",
            self.record.id,
            gp.log_marginal_likelihood()
        );

        self.gp = Some(gp);
        self.gp_mu = None;
        self.gp_var = None;

        Ok(())
    }

    /// Predict the importance of every frame up to the last sampled one and keep the result.
    pub fn predict_frames(&mut self) -> Result<Prediction, VideoError> {
        let frames = Array2::from_shape_fn((self.sampled_frames(), 1), |(i, _)| i as f64);
        let prediction = self.fitted_gp()?.predict(&frames).map_err(|e| self.gp_err(e))?;

        self.gp_mu = Some(prediction.mean.clone());
        self.gp_var = Some(prediction.variance.clone());

        Ok(prediction)
    }

    /// Plot every annotator's samples as a mean trace plus bootstrap resampled traces.
    pub fn plot_samples(&self, path: impl AsRef<Path>, cfg: &PlotCfg, font: Option<&Font>) -> Result<(), VideoError> {
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        plotting::plot_bootstrap(&self.samples, cfg, font, &mut rng)
            .and_then(|img| plotting::save_plot(&img, path))
            .map_err(|e| self.plot_err(e))
    }

    /// Plot the observations with the fitted posterior mean and its confidence band.
    pub fn plot_gaussian_process(
        &self,
        path: impl AsRef<Path>,
        cfg: &PlotCfg,
        font: Option<&Font>,
    ) -> Result<(), VideoError> {
        let gp = self.fitted_gp()?;

        let hi = self.sampled_frames() as f64;
        let grid = (0..GP_PLOT_POINTS)
            .map(|i| hi * i as f64 / (GP_PLOT_POINTS - 1) as f64)
            .collect::<Vec<_>>();
        let grid_col = Array2::from_shape_vec((grid.len(), 1), grid.clone()).unwrap_or_else(|_| unreachable!());
        let prediction = gp.predict(&grid_col).map_err(|e| self.gp_err(e))?;

        let obs_x = self.sample_locations.column(0).to_vec();
        let obs_y = self.sample_data.column(0).to_vec();

        plotting::plot_gp(
            (obs_x.as_slice(), obs_y.as_slice()),
            &grid,
            &prediction,
            CONFIDENCE_BAND_SIGMAS,
            cfg,
            font,
        )
        .and_then(|img| plotting::save_plot(&img, path))
        .map_err(|e| self.plot_err(e))
    }

    /// Predict every frame (as `predict_frames`) and plot the mean with a band of one
    /// variance either side.
    pub fn plot_predictions(
        &mut self,
        path: impl AsRef<Path>,
        cfg: &PlotCfg,
        font: Option<&Font>,
    ) -> Result<(), VideoError> {
        let prediction = self.predict_frames()?;
        let frames = (0..prediction.len()).map(|i| i as f64).collect::<Vec<_>>();

        plotting::plot_prediction_band(&frames, &prediction, cfg, font)
            .and_then(|img| plotting::save_plot(&img, path))
            .map_err(|e| self.plot_err(e))
    }
}

impl fmt::Display for Video {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Video Title: {}", self.record.title)?;
        writeln!(f, "Video Id: {}", self.record.id)?;
        writeln!(f, "Video Url: {}", self.record.url)?;
        writeln!(f, "Video Duration: {}", self.record.duration)?;
        write!(f, "Video Genre: {}", self.record.genre)
    }
}
