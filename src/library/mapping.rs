use std::collections::BTreeMap;

use crate::library::{
    definitions::ANNOTATION_FIELDS, LibError, ShortRowPolicy, Video, VideoRecord,
};

/// video id -> metadata
pub type VideoInfoMapping = BTreeMap<String, VideoRecord>;

/// video id -> one rating sequence per annotator, in file order
pub type RatingMapping = BTreeMap<String, Vec<Vec<i64>>>;

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|field| field.trim().is_empty())
}

/// Build the id -> metadata mapping from `[genre, id, title, url, duration]` rows.
/// Blank rows are skipped. When an id repeats, the last row wins.
pub fn get_video_data_mapping(rows: &[Vec<String>]) -> Result<VideoInfoMapping, LibError> {
    let mut mapping = VideoInfoMapping::new();

    for (row_no, row) in rows.iter().enumerate() {
        if is_blank(row) {
            continue;
        }
        let record = VideoRecord::from_row(row_no, row)?;
        mapping.insert(record.id.clone(), record);
    }

    Ok(mapping)
}

/// Build the id -> ratings mapping from `[id, genre, "r1,r2,..."]` rows. Each row is one
/// annotator's ratings for one video.
///
/// A row with fewer than three fields (such as the empty row after a trailing newline)
/// either ends the mapping or is skipped, depending on `short_rows`.
pub fn get_rating_data_mapping(rows: &[Vec<String>], short_rows: ShortRowPolicy) -> Result<RatingMapping, LibError> {
    let mut mapping = RatingMapping::new();

    for (row_no, row) in rows.iter().enumerate() {
        if row.len() < ANNOTATION_FIELDS {
            match short_rows {
                ShortRowPolicy::Stop => {
                    if row_no + 1 < rows.len() {
                        debug!(target: "mapping",
                            "Short annotation row {} ends the mapping, {} rows unread",
                            row_no,
                            rows.len() - row_no - 1
                        );
                    }
                    break;
                }
                ShortRowPolicy::Skip => continue,
            }
        }

        let video_id = &row[0];
        let ratings = row[2]
            .split(',')
            .map(|rating| {
                rating.trim().parse::<i64>().map_err(|_| LibError::RatingParseError {
                    id: video_id.clone(),
                    value: rating.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        mapping.entry(video_id.clone()).or_insert_with(Vec::new).push(ratings);
    }

    Ok(mapping)
}

/// Create one `Video` for every rated id that also has metadata, in id order.
///
/// Ids with no metadata, and videos that cannot be built, are returned as errors alongside
/// the videos that could be.
pub fn get_video_objects(video_mapping: &VideoInfoMapping, rating_mapping: RatingMapping) -> (Vec<Video>, Vec<LibError>) {
    let mut videos = vec![];
    let mut errs = vec![];

    for (video_id, ratings) in rating_mapping {
        let record = match video_mapping.get(&video_id) {
            Some(record) => record.clone(),
            None => {
                errs.push(LibError::MissingVideoInfo(video_id));
                continue;
            }
        };

        match Video::new(record, ratings) {
            Ok(video) => videos.push(video),
            Err(e) => errs.push(LibError::from(e)),
        }
    }

    (videos, errs)
}
