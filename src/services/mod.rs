pub mod annotation_service;
pub mod coordinate_service;
pub mod dataset_service;
pub mod metadata_service;
pub mod schema_service;
