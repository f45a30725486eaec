use std::path::PathBuf;

use crate::models::annotation::UiId;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid annotation file {}: {source}", path.display())]
    AnnotationParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Annotation {id} has a zero image dimension ({width}x{height})")]
    InvalidImageSize { id: UiId, width: u32, height: u32 },

    #[error("Annotation {id} has a bounding box outside its image: {bbox:?}")]
    InvalidBoundingBox { id: UiId, bbox: [f64; 4] },

    #[error("Dataset already exists: {0}")]
    DatasetExists(String),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Saved view not found: {0}")]
    ViewNotFound(String),

    #[error("{0}")]
    General(String),
}
