use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::config::IngestConfig;
use crate::error::AppError;
use crate::models::annotation::AnnotationEntry;
use crate::models::sample::{Classification, Detection, Sample};
use crate::services::coordinate_service::{self, BoxPolicy};

/// Samples built from one pass over the annotation directory.
#[derive(Debug, Default)]
pub struct LoadedAnnotations {
    pub samples: Vec<Sample>,
    pub files: usize,
    pub entries: usize,
    pub skipped_missing: usize,
}

/// Annotation files directly inside `dir` with the given extension, sorted by name.
pub fn discover_annotation_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Err(AppError::General(format!(
            "annotations directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| AppError::General(e.to_string()))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let matches = !hidden
            && entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == extension);
        if matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub fn read_annotation_file(path: &Path) -> Result<Vec<AnnotationEntry>, AppError> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| AppError::AnnotationParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn build_sample(
    entry: &AnnotationEntry,
    image_path: &Path,
    policy: BoxPolicy,
) -> Result<Sample, AppError> {
    let bounding_box = coordinate_service::normalize_entry(entry, policy)?;
    let canonical = image_path
        .canonicalize()
        .unwrap_or_else(|_| image_path.to_path_buf());

    Ok(Sample {
        id: uuid::Uuid::new_v4().to_string(),
        filepath: canonical.to_string_lossy().to_string(),
        ui_id: entry.id.clone(),
        instruction: entry.instruction.clone(),
        application: Classification::new(&entry.application),
        group: Classification::new(&entry.group),
        platform: Classification::new(&entry.platform),
        action_detection: Detection {
            label: entry.ui_type.clone(),
            bounding_box,
        },
        metadata: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Reads every annotation file and builds one sample per entry whose image
/// exists. Missing images are skipped; any parse or conversion error aborts.
pub fn parse_annotation_files(config: &IngestConfig) -> Result<LoadedAnnotations, AppError> {
    let files =
        discover_annotation_files(&config.annotations_dir, &config.annotation_extension)?;
    let mut loaded = LoadedAnnotations {
        files: files.len(),
        ..Default::default()
    };

    for path in &files {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        tracing::info!(file = %name, "processing annotation file");

        let entries = read_annotation_file(path)?;
        loaded.entries += entries.len();

        for entry in &entries {
            let image_path = config.images_dir.join(&entry.img_filename);
            if !image_path.is_file() {
                tracing::warn!(image = %image_path.display(), id = %entry.id, "image not found, skipping");
                loaded.skipped_missing += 1;
                continue;
            }
            loaded
                .samples
                .push(build_sample(entry, &image_path, config.box_policy)?);
        }
    }

    tracing::info!(samples = loaded.samples.len(), "processed samples total");
    Ok(loaded)
}
