use std::{fmt::Debug, path::PathBuf};

use thiserror::Error;

use crate::library::VideoError;

#[derive(Error, Debug, Clone)]
pub enum LibError {
    #[error("Failed to read {path}: {src}")]
    TsvReadError { src: String, path: PathBuf },

    #[error("Malformed video info at data row {row}: expected {expected} fields, found {found}")]
    VideoInfoRowError { row: usize, expected: usize, found: usize },

    #[error("Could not parse duration {duration:?} of video {id} (expected MM:SS)")]
    DurationParseError { id: String, duration: String },

    #[error("Could not parse rating {value:?} for video {id}")]
    RatingParseError { id: String, value: String },

    #[error("Annotated video {0} has no entry in the video info file")]
    MissingVideoInfo(String),

    #[error(transparent)]
    VideoError(#[from] VideoError),
}
