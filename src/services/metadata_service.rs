use std::path::Path;

use image::{ImageDecoder, ImageReader};
use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::models::sample::ImageMetadata;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetadataReport {
    pub computed: usize,
    pub failed: usize,
}

/// Reads size, format and dimensions from the image header without decoding pixels.
pub fn read_image_metadata(path: &Path) -> Result<ImageMetadata, AppError> {
    let size_bytes = std::fs::metadata(path)?.len() as i64;
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let mime_type = reader.format().map(|f| f.to_mime_type().to_string());
    let decoder = reader.into_decoder()?;
    let (width, height) = decoder.dimensions();

    Ok(ImageMetadata {
        size_bytes,
        mime_type,
        width,
        height,
        num_channels: decoder.color_type().channel_count(),
    })
}

/// Fills in metadata for every sample of the dataset that has none yet.
/// Unreadable images are logged and counted, not fatal.
pub fn compute_metadata(conn: &Connection, dataset_id: i64) -> Result<MetadataReport, AppError> {
    let pending = repository::list_samples_missing_metadata(conn, dataset_id)?;
    let mut report = MetadataReport::default();

    let tx = conn.unchecked_transaction()?;
    for (sample_id, filepath) in pending {
        match read_image_metadata(Path::new(&filepath)) {
            Ok(metadata) => {
                repository::update_sample_metadata(&tx, &sample_id, &metadata)?;
                report.computed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %filepath, error = %e, "failed to compute image metadata");
                report.failed += 1;
            }
        }
    }
    tx.commit()?;

    tracing::debug!(computed = report.computed, failed = report.failed, "metadata computed");
    Ok(report)
}
