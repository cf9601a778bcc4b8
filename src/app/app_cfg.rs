use std::path::PathBuf;

use crate::library::{GpCfg, LoadCfg, PlotCfg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportVerbosity {
    Quiet,
    Default,
    Verbose,
}

#[derive(Debug, Clone)]
pub struct OutputCfg {
    pub json_output: bool,
    pub plot_dir: Option<PathBuf>,
    pub font_path: Option<PathBuf>,

    pub verbosity: ReportVerbosity,
}

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub load_cfg: LoadCfg,
    pub gp_cfg: GpCfg,
    pub plot_cfg: PlotCfg,
    pub output_cfg: OutputCfg,

    //restrict processing to these ids. Empty means every video.
    pub video_ids: Vec<String>,
    pub fit: bool,
}
