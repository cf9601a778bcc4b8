use crate::library::{GpCfg, PlotCfg};

// Annotation capture rate. Every frame of a video carries one rating per annotator.
pub const ANNOTATION_FRAMERATE: u32 = 30;

// Ratings are sampled once every 2 seconds, i.e. every 60 frames @ 30fps.
pub const SAMPLE_INTERVAL_SECS: u32 = 2;
pub const FRAMES_PER_SAMPLE: usize = (ANNOTATION_FRAMERATE * SAMPLE_INTERVAL_SECS) as usize;

// Minimum number of fields in a row of each input file.
pub const VIDEO_INFO_FIELDS: usize = 5;
pub const ANNOTATION_FIELDS: usize = 3;

pub const DEFAULT_GP: GpCfg = GpCfg {
    kernel_variance: 2.29,
    lengthscale: 60.0,
    noise_variance: 1.0,
};

pub const DEFAULT_N_BOOT: usize = 500;
pub const DEFAULT_BOOT_SEED: u64 = 0;

pub const DEFAULT_PLOT: PlotCfg = PlotCfg {
    width: 1600,
    height: 1200,
    n_boot: DEFAULT_N_BOOT,
    seed: DEFAULT_BOOT_SEED,
};

// Multiplier applied to the predictive standard deviation for the confidence band
// drawn by the GP plot (~95%).
pub const CONFIDENCE_BAND_SIGMAS: f64 = 2.0;

// Number of evenly spaced points at which the GP plot evaluates the posterior.
pub const GP_PLOT_POINTS: usize = 200;
