use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the rating mapping does when it meets a row with too few fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortRowPolicy {
    /// Stop reading at the first short row. Rows after it are never seen.
    Stop,
    /// Ignore the short row and carry on with the next one.
    Skip,
}

impl Default for ShortRowPolicy {
    fn default() -> Self {
        Self::Stop
    }
}

#[derive(Debug, Clone)]
pub struct LoadCfg {
    pub video_info_path: PathBuf,
    pub annotations_path: PathBuf,
    pub short_rows: ShortRowPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpCfg {
    pub kernel_variance: f64,
    pub lengthscale: f64,
    pub noise_variance: f64,
}

impl Default for GpCfg {
    fn default() -> Self {
        crate::library::definitions::DEFAULT_GP
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotCfg {
    pub width: u32,
    pub height: u32,
    pub n_boot: usize,
    pub seed: u64,
}

impl Default for PlotCfg {
    fn default() -> Self {
        crate::library::definitions::DEFAULT_PLOT
    }
}
