use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::models::field::FieldSchema;
use crate::models::sample::Sample;
use crate::models::view::{GroupedView, SampleField, SampleGroup};
use crate::services::metadata_service::{self, MetadataReport};
use crate::services::schema_service;

/// A named sample collection in the local store.
#[derive(Debug)]
pub struct Dataset<'a> {
    conn: &'a Connection,
    id: i64,
    name: String,
}

impl<'a> Dataset<'a> {
    /// Creates an empty dataset. With `overwrite`, any dataset of the same name
    /// is deleted together with its samples, fields and views. The delete and
    /// the new insert share one transaction.
    pub fn create(conn: &'a Connection, name: &str, overwrite: bool) -> Result<Self, AppError> {
        let tx = conn.unchecked_transaction()?;
        let replaced = repository::find_dataset_id(&tx, name)?.is_some();
        if replaced {
            if !overwrite {
                return Err(AppError::DatasetExists(name.to_string()));
            }
            repository::delete_dataset(&tx, name)?;
        }

        let id = repository::insert_dataset(&tx, name, &chrono::Utc::now().to_rfc3339())?;
        for field in schema_service::base_schema() {
            repository::insert_field_if_absent(&tx, id, &field)?;
        }
        tx.commit()?;

        if replaced {
            tracing::info!(dataset = name, "replaced existing dataset");
        }

        tracing::debug!(dataset = name, id, "dataset created");
        Ok(Self {
            conn,
            id,
            name: name.to_string(),
        })
    }

    pub fn load(conn: &'a Connection, name: &str) -> Result<Self, AppError> {
        let id = repository::find_dataset_id(conn, name)?
            .ok_or_else(|| AppError::DatasetNotFound(name.to_string()))?;
        Ok(Self {
            conn,
            id,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts all samples in one transaction, keeping their order.
    pub fn add_samples(&self, samples: &[Sample]) -> Result<usize, AppError> {
        let tx = self.conn.unchecked_transaction()?;
        for sample in samples {
            repository::insert_sample(&tx, self.id, sample)?;
        }
        tx.commit()?;

        tracing::debug!(dataset = %self.name, added = samples.len(), "samples added");
        Ok(samples.len())
    }

    pub fn count(&self) -> Result<usize, AppError> {
        repository::count_samples(self.conn, self.id)
    }

    pub fn samples(&self) -> Result<Vec<Sample>, AppError> {
        repository::list_samples(self.conn, self.id)
    }

    pub fn compute_metadata(&self) -> Result<MetadataReport, AppError> {
        metadata_service::compute_metadata(self.conn, self.id)
    }

    /// Registers embedded attribute paths found in the stored samples that the
    /// schema does not know yet. Returns the newly added fields.
    pub fn add_dynamic_sample_fields(&self) -> Result<Vec<FieldSchema>, AppError> {
        let inferred = schema_service::infer_dynamic_fields(&self.samples()?)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut added = Vec::new();
        for (path, kind) in inferred {
            let field = FieldSchema {
                path,
                kind,
                dynamic: true,
            };
            if repository::insert_field_if_absent(&tx, self.id, &field)? {
                added.push(field);
            }
        }
        tx.commit()?;

        tracing::debug!(dataset = %self.name, added = added.len(), "dynamic fields registered");
        Ok(added)
    }

    pub fn schema(&self) -> Result<Vec<FieldSchema>, AppError> {
        repository::list_fields(self.conn, self.id)
    }

    pub fn group_by(&self, field: SampleField, order_by: SampleField) -> Result<GroupedView, AppError> {
        if !field.is_categorical() {
            return Err(AppError::General(format!(
                "cannot group by non-label field: {field}"
            )));
        }
        Ok(GroupedView {
            group_by: field,
            order_by,
        })
    }

    pub fn save_view(&self, name: &str, view: &GroupedView) -> Result<(), AppError> {
        repository::upsert_view(
            self.conn,
            self.id,
            name,
            view,
            &chrono::Utc::now().to_rfc3339(),
        )?;
        tracing::debug!(dataset = %self.name, view = name, group_by = %view.group_by, "view saved");
        Ok(())
    }

    pub fn list_views(&self) -> Result<Vec<String>, AppError> {
        repository::list_view_names(self.conn, self.id)
    }

    /// Materialises a saved view: groups ordered by key, samples inside each
    /// group ordered by the view's order field.
    pub fn load_view(&self, name: &str) -> Result<Vec<SampleGroup>, AppError> {
        let view = repository::get_view(self.conn, self.id, name)?
            .ok_or_else(|| AppError::ViewNotFound(name.to_string()))?;
        let samples = repository::list_samples_grouped(self.conn, self.id, &view)?;

        let mut groups: Vec<SampleGroup> = Vec::new();
        for sample in samples {
            let key = group_key(&sample, view.group_by);
            match groups.last_mut() {
                Some(group) if group.key == key => group.samples.push(sample),
                _ => groups.push(SampleGroup {
                    key,
                    samples: vec![sample],
                }),
            }
        }
        Ok(groups)
    }

    pub fn save(&self) -> Result<(), AppError> {
        repository::mark_dataset_saved(self.conn, self.id, &chrono::Utc::now().to_rfc3339())?;
        tracing::info!(dataset = %self.name, "dataset saved");
        Ok(())
    }

    pub fn last_saved_at(&self) -> Result<Option<String>, AppError> {
        repository::get_dataset_saved_at(self.conn, self.id)
    }
}

fn group_key(sample: &Sample, field: SampleField) -> String {
    match field {
        SampleField::Filepath => sample.filepath.clone(),
        SampleField::UiId => sample.ui_id.to_string(),
        SampleField::Instruction => sample.instruction.clone(),
        SampleField::Application => sample.application.label.clone(),
        SampleField::Group => sample.group.label.clone(),
        SampleField::Platform => sample.platform.label.clone(),
        SampleField::DetectionLabel => sample.action_detection.label.clone(),
    }
}
