use serde::{Deserialize, Serialize};

use crate::library::{definitions::VIDEO_INFO_FIELDS, LibError};

/// One row of the video info file.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize, Default)]
pub struct VideoRecord {
    pub genre: String,
    pub id: String,
    pub title: String,
    pub url: String,
    /// Length of the video in whole seconds.
    pub duration: u32,
}

impl VideoRecord {
    /// Build a record from a `[genre, id, title, url, duration]` row. `row_no` is only used to
    /// report errors. Fields past the fifth are ignored.
    pub fn from_row(row_no: usize, row: &[String]) -> Result<Self, LibError> {
        if row.len() < VIDEO_INFO_FIELDS {
            return Err(LibError::VideoInfoRowError {
                row: row_no,
                expected: VIDEO_INFO_FIELDS,
                found: row.len(),
            });
        }

        let duration = parse_duration(&row[4]).ok_or_else(|| LibError::DurationParseError {
            id: row[1].clone(),
            duration: row[4].clone(),
        })?;

        Ok(Self {
            genre: row[0].clone(),
            id: row[1].clone(),
            title: row[2].clone(),
            url: row[3].clone(),
            duration,
        })
    }
}

/// Parse a `MM:SS` duration into seconds. Minutes may exceed 59.
pub fn parse_duration(duration: &str) -> Option<u32> {
    let mut parts = duration.trim().split(':');
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    let seconds: u32 = parts.next()?.trim().parse().ok()?;

    if parts.next().is_some() {
        return None;
    }

    minutes.checked_mul(60)?.checked_add(seconds)
}
