use std::path::PathBuf;

use thiserror::Error;

use crate::library::{LibError, VideoError};

#[derive(Error, Debug)]
pub enum AppError {
    /////////////////////////////////
    // Argument parsing
    #[error("{0}")]
    ArgParseError(String),

    #[error("could not parse value given for --{arg}: {value}")]
    ParseValueError { arg: &'static str, value: String },

    /////////////////////////////////
    // Output
    #[error("Font file not found at {0}")]
    FontNotFoundError(PathBuf, #[source] std::io::Error),

    #[error("Not a usable TrueType font: {0}")]
    FontParseError(PathBuf),

    #[error("Could not create plot directory {0}")]
    PlotDirError(PathBuf, #[source] std::io::Error),

    #[error("Video {0} given with --video was not loaded")]
    UnknownVideoId(String),

    /////////////////////////////////
    // Library
    #[error(transparent)]
    LibError(#[from] LibError),

    #[error(transparent)]
    VideoError(#[from] VideoError),
}
