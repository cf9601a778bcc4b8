pub mod definitions;
pub mod errors;
pub mod gaussian_process;
mod library_cfg;
pub mod mapping;
pub mod plotting;
pub mod tsv;
pub mod video;
mod video_record;

//exports
pub use errors::LibError;
pub use gaussian_process::{GaussianProcess, GpError, Prediction, RbfKernel};
pub use library_cfg::{GpCfg, LoadCfg, PlotCfg, ShortRowPolicy};
pub use mapping::{get_rating_data_mapping, get_video_data_mapping, get_video_objects};
pub use tsv::{read_tsv, TsvTable};
pub use video::{Video, VideoError};
pub use video_record::VideoRecord;

/// Read both input files and build one `Video` per video id present in both.
///
/// Returns the videos alongside non-fatal errors for annotated videos that could not be built.
pub fn load_videos(load_cfg: &LoadCfg) -> Result<(Vec<Video>, Vec<LibError>), LibError> {
    let video_info = read_tsv(&load_cfg.video_info_path)?;
    let annotations = read_tsv(&load_cfg.annotations_path)?;

    let video_mapping = get_video_data_mapping(&video_info.rows)?;
    let rating_mapping = get_rating_data_mapping(&annotations.rows, load_cfg.short_rows)?;

    trace!(target: "load",
        "{} videos with info, {} videos with ratings",
        video_mapping.len(),
        rating_mapping.len()
    );

    let (videos, errs) = get_video_objects(&video_mapping, rating_mapping);

    info!(target: "load", "Loaded {} videos", videos.len());

    Ok((videos, errs))
}
