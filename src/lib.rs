//! Loads ScreenSpot-Pro UI grounding annotations into a local detection
//! dataset store.
//!
//! A run discovers the per-application annotation files, turns every entry
//! whose screenshot exists into a [`models::sample::Sample`] with a relative
//! bounding box, writes them into a freshly created dataset, computes image
//! metadata, registers dynamic fields and saves a view grouped by application.

pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;

use serde::Serialize;

pub use config::{Cli, IngestConfig};
pub use error::AppError;
use services::annotation_service;
use services::dataset_service::Dataset;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub dataset: String,
    pub files: usize,
    pub entries: usize,
    pub skipped_missing: usize,
    pub samples: usize,
    pub metadata_computed: usize,
    pub metadata_failed: usize,
    pub dynamic_fields: usize,
    pub groups: usize,
}

/// load -> normalise -> bulk insert -> post-process -> save, against an open store.
pub fn ingest(conn: &rusqlite::Connection, config: &IngestConfig) -> Result<IngestReport, AppError> {
    let loaded = annotation_service::parse_annotation_files(config)?;

    let dataset = Dataset::create(conn, &config.dataset_name, config.overwrite)?;
    let samples = dataset.add_samples(&loaded.samples)?;
    let metadata = dataset.compute_metadata()?;
    let dynamic_fields = dataset.add_dynamic_sample_fields()?;

    let view = dataset.group_by(config.group_by, config.order_by)?;
    dataset.save_view(&config.view_name, &view)?;
    let groups = dataset.load_view(&config.view_name)?.len();
    dataset.save()?;

    Ok(IngestReport {
        dataset: dataset.name().to_string(),
        files: loaded.files,
        entries: loaded.entries,
        skipped_missing: loaded.skipped_missing,
        samples,
        metadata_computed: metadata.computed,
        metadata_failed: metadata.failed,
        dynamic_fields: dynamic_fields.len(),
        groups,
    })
}

/// Opens the store named in `config` and ingests into it.
pub fn run(config: &IngestConfig) -> Result<IngestReport, AppError> {
    let conn = data::open_store(&config.database_path)?;
    tracing::debug!(path = %config.database_path.display(), "dataset store opened");
    ingest(&conn, config)
}
