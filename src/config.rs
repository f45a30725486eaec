use std::path::{Path, PathBuf};

use clap::Parser;

use crate::models::view::SampleField;
use crate::services::coordinate_service::BoxPolicy;

pub const DEFAULT_DATASET_ROOT: &str = "ScreenSpot-Pro";
pub const DEFAULT_DATASET_NAME: &str = "ScreenSpot_Pro";
pub const DEFAULT_VIEW_NAME: &str = "applications";
pub const ANNOTATIONS_SUBDIR: &str = "annotations";
pub const IMAGES_SUBDIR: &str = "images";
pub const ANNOTATION_EXTENSION: &str = "json";
const DATABASE_FILE: &str = "datasets.db";

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub annotations_dir: PathBuf,
    pub images_dir: PathBuf,
    pub annotation_extension: String,
    pub dataset_name: String,
    pub view_name: String,
    pub group_by: SampleField,
    pub order_by: SampleField,
    /// Replace an existing dataset with the same name.
    pub overwrite: bool,
    pub box_policy: BoxPolicy,
    pub database_path: PathBuf,
}

impl IngestConfig {
    /// Standard `<root>/annotations` + `<root>/images` layout.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            annotations_dir: root.join(ANNOTATIONS_SUBDIR),
            images_dir: root.join(IMAGES_SUBDIR),
            annotation_extension: ANNOTATION_EXTENSION.to_string(),
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            view_name: DEFAULT_VIEW_NAME.to_string(),
            group_by: SampleField::Application,
            order_by: SampleField::UiId,
            overwrite: true,
            box_policy: BoxPolicy::default(),
            database_path: default_database_path(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_root(DEFAULT_DATASET_ROOT)
    }
}

/// Per-user data directory, or the working directory when none can be resolved.
pub fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "screenspot-ingest")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
}

/// Load ScreenSpot-Pro annotations into the local dataset store.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Dataset root holding `annotations/` and `images/`
    #[arg(long, env = "SCREENSPOT_ROOT", default_value = DEFAULT_DATASET_ROOT)]
    pub root: PathBuf,

    /// Override the annotations directory
    #[arg(long, env = "SCREENSPOT_ANNOTATIONS_DIR")]
    pub annotations_dir: Option<PathBuf>,

    /// Override the images directory
    #[arg(long, env = "SCREENSPOT_IMAGES_DIR")]
    pub images_dir: Option<PathBuf>,

    /// Name of the dataset to create
    #[arg(long, env = "SCREENSPOT_DATASET", default_value = DEFAULT_DATASET_NAME)]
    pub dataset: String,

    /// Name of the saved grouped view
    #[arg(long, default_value = DEFAULT_VIEW_NAME)]
    pub view: String,

    /// Field the saved view groups by
    #[arg(long, default_value = "application")]
    pub group_by: SampleField,

    /// Field samples are ordered by inside each group
    #[arg(long, default_value = "ui_id")]
    pub order_by: SampleField,

    /// Fail instead of replacing an existing dataset
    #[arg(long)]
    pub no_overwrite: bool,

    /// Handling of inverted or out-of-image boxes: pass-through, clamp or reject
    #[arg(long, env = "SCREENSPOT_BBOX_POLICY", default_value = "pass-through")]
    pub bbox_policy: BoxPolicy,

    /// SQLite database file for the dataset store
    #[arg(long, env = "SCREENSPOT_DATABASE")]
    pub database: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> IngestConfig {
        let mut config = IngestConfig::from_root(&self.root);
        if let Some(dir) = self.annotations_dir {
            config.annotations_dir = dir;
        }
        if let Some(dir) = self.images_dir {
            config.images_dir = dir;
        }
        if let Some(path) = self.database {
            config.database_path = path;
        }
        config.dataset_name = self.dataset;
        config.view_name = self.view;
        config.group_by = self.group_by;
        config.order_by = self.order_by;
        config.overwrite = !self.no_overwrite;
        config.box_policy = self.bbox_policy;
        config
    }
}
