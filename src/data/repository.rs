use rusqlite::{params, Connection, Row};

use crate::error::AppError;
use crate::models::field::FieldSchema;
use crate::models::sample::{Classification, Detection, ImageMetadata, RelativeBox, Sample};
use crate::models::view::GroupedView;

const SAMPLE_COLUMNS: &str = "id, filepath, ui_id, instruction, application, group_label, platform, detection_label, bbox_x, bbox_y, bbox_w, bbox_h, metadata, created_at";

pub fn insert_dataset(conn: &Connection, name: &str, created_at: &str) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO datasets (name, created_at) VALUES (?1, ?2)",
        params![name, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_dataset_id(conn: &Connection, name: &str) -> Result<Option<i64>, AppError> {
    let id = conn
        .query_row(
            "SELECT id FROM datasets WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn delete_dataset(conn: &Connection, name: &str) -> Result<usize, AppError> {
    let count = conn.execute("DELETE FROM datasets WHERE name = ?1", params![name])?;
    Ok(count)
}

pub fn mark_dataset_saved(conn: &Connection, dataset_id: i64, at: &str) -> Result<usize, AppError> {
    let count = conn.execute(
        "UPDATE datasets SET last_saved_at = ?1 WHERE id = ?2",
        params![at, dataset_id],
    )?;
    Ok(count)
}

pub fn get_dataset_saved_at(conn: &Connection, dataset_id: i64) -> Result<Option<String>, AppError> {
    let saved_at = conn.query_row(
        "SELECT last_saved_at FROM datasets WHERE id = ?1",
        params![dataset_id],
        |row| row.get(0),
    )?;
    Ok(saved_at)
}

pub fn insert_sample(conn: &Connection, dataset_id: i64, sample: &Sample) -> Result<i64, AppError> {
    let metadata_json = sample
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let bbox = sample.action_detection.bounding_box;

    conn.execute(
        "INSERT INTO samples (id, dataset_id, filepath, ui_id, instruction, application, group_label, platform, detection_label, bbox_x, bbox_y, bbox_w, bbox_h, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            sample.id,
            dataset_id,
            sample.filepath,
            sample.ui_id,
            sample.instruction,
            sample.application.label,
            sample.group.label,
            sample.platform.label,
            sample.action_detection.label,
            bbox.x,
            bbox.y,
            bbox.width,
            bbox.height,
            metadata_json,
            sample.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<Sample> {
    let metadata_str: Option<String> = row.get(12)?;
    let metadata = metadata_str
        .map(|s| serde_json::from_str::<ImageMetadata>(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(Sample {
        id: row.get(0)?,
        filepath: row.get(1)?,
        ui_id: row.get(2)?,
        instruction: row.get(3)?,
        application: Classification::new(row.get::<_, String>(4)?),
        group: Classification::new(row.get::<_, String>(5)?),
        platform: Classification::new(row.get::<_, String>(6)?),
        action_detection: Detection {
            label: row.get(7)?,
            bounding_box: RelativeBox {
                x: row.get(8)?,
                y: row.get(9)?,
                width: row.get(10)?,
                height: row.get(11)?,
            },
        },
        metadata,
        created_at: row.get(13)?,
    })
}

pub fn list_samples(conn: &Connection, dataset_id: i64) -> Result<Vec<Sample>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SAMPLE_COLUMNS} FROM samples WHERE dataset_id = ?1 ORDER BY seq ASC"
    ))?;

    let samples = stmt
        .query_map(params![dataset_id], sample_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(samples)
}

/// Samples sorted for a grouped view. Ties on both fields keep insertion order.
pub fn list_samples_grouped(
    conn: &Connection,
    dataset_id: i64,
    view: &GroupedView,
) -> Result<Vec<Sample>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SAMPLE_COLUMNS} FROM samples WHERE dataset_id = ?1 ORDER BY {} ASC, {} ASC, seq ASC",
        view.group_by.column(),
        view.order_by.column(),
    ))?;

    let samples = stmt
        .query_map(params![dataset_id], sample_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(samples)
}

pub fn count_samples(conn: &Connection, dataset_id: i64) -> Result<usize, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM samples WHERE dataset_id = ?1",
        params![dataset_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// `(sample id, filepath)` pairs still waiting for image metadata.
pub fn list_samples_missing_metadata(
    conn: &Connection,
    dataset_id: i64,
) -> Result<Vec<(String, String)>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, filepath FROM samples WHERE dataset_id = ?1 AND metadata IS NULL ORDER BY seq ASC",
    )?;

    let pending = stmt
        .query_map(params![dataset_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pending)
}

pub fn update_sample_metadata(
    conn: &Connection,
    sample_id: &str,
    metadata: &ImageMetadata,
) -> Result<usize, AppError> {
    let metadata_json = serde_json::to_string(metadata)?;
    let count = conn.execute(
        "UPDATE samples SET metadata = ?1 WHERE id = ?2",
        params![metadata_json, sample_id],
    )?;
    Ok(count)
}

/// Registers a field unless its path is already known. Returns whether it was added.
pub fn insert_field_if_absent(
    conn: &Connection,
    dataset_id: i64,
    field: &FieldSchema,
) -> Result<bool, AppError> {
    let kind_json = serde_json::to_string(&field.kind)?;
    let count = conn.execute(
        "INSERT OR IGNORE INTO dataset_fields (dataset_id, path, kind, dynamic) VALUES (?1, ?2, ?3, ?4)",
        params![dataset_id, field.path, kind_json, field.dynamic],
    )?;
    Ok(count > 0)
}

pub fn list_fields(conn: &Connection, dataset_id: i64) -> Result<Vec<FieldSchema>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT path, kind, dynamic FROM dataset_fields WHERE dataset_id = ?1 ORDER BY path ASC",
    )?;

    let rows = stmt
        .query_map(params![dataset_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(path, kind, dynamic)| -> Result<FieldSchema, AppError> {
            Ok(FieldSchema {
                path,
                kind: serde_json::from_str(&kind)?,
                dynamic,
            })
        })
        .collect()
}

pub fn upsert_view(
    conn: &Connection,
    dataset_id: i64,
    name: &str,
    view: &GroupedView,
    created_at: &str,
) -> Result<(), AppError> {
    let definition = serde_json::to_string(view)?;
    conn.execute(
        "INSERT OR REPLACE INTO saved_views (dataset_id, name, definition, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![dataset_id, name, definition, created_at],
    )?;
    Ok(())
}

pub fn get_view(
    conn: &Connection,
    dataset_id: i64,
    name: &str,
) -> Result<Option<GroupedView>, AppError> {
    let definition: Option<String> = conn
        .query_row(
            "SELECT definition FROM saved_views WHERE dataset_id = ?1 AND name = ?2",
            params![dataset_id, name],
            |row| row.get(0),
        )
        .optional()?;

    definition
        .map(|d| serde_json::from_str(&d))
        .transpose()
        .map_err(AppError::from)
}

pub fn list_view_names(conn: &Connection, dataset_id: i64) -> Result<Vec<String>, AppError> {
    let mut stmt =
        conn.prepare("SELECT name FROM saved_views WHERE dataset_id = ?1 ORDER BY name ASC")?;
    let names = stmt
        .query_map(params![dataset_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

// Needed for rusqlite optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations::run_migrations;
    use crate::models::annotation::UiId;
    use crate::models::field::FieldKind;
    use crate::models::view::SampleField;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn sample(application: &str, ui_id: UiId) -> Sample {
        Sample {
            id: uuid::Uuid::new_v4().to_string(),
            filepath: format!("/data/images/{application}/{ui_id}.png"),
            ui_id,
            instruction: "click the save button".to_string(),
            application: Classification::new(application),
            group: Classification::new("Office"),
            platform: Classification::new("windows"),
            action_detection: Detection {
                label: "icon".to_string(),
                bounding_box: RelativeBox {
                    x: 0.1,
                    y: 0.2,
                    width: 0.3,
                    height: 0.4,
                },
            },
            metadata: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_dataset_crud() {
        let conn = setup_db();

        let id = insert_dataset(&conn, "ScreenSpot_Pro", "2025-01-01T00:00:00Z").unwrap();
        assert!(id > 0);
        assert_eq!(find_dataset_id(&conn, "ScreenSpot_Pro").unwrap(), Some(id));
        assert_eq!(get_dataset_saved_at(&conn, id).unwrap(), None);

        mark_dataset_saved(&conn, id, "2025-01-02T00:00:00Z").unwrap();
        assert_eq!(
            get_dataset_saved_at(&conn, id).unwrap().as_deref(),
            Some("2025-01-02T00:00:00Z")
        );

        assert_eq!(delete_dataset(&conn, "ScreenSpot_Pro").unwrap(), 1);
        assert!(find_dataset_id(&conn, "ScreenSpot_Pro").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_dataset_name_is_rejected() {
        let conn = setup_db();
        insert_dataset(&conn, "dup", "t").unwrap();
        assert!(insert_dataset(&conn, "dup", "t").is_err());
    }

    #[test]
    fn test_sample_roundtrip_preserves_fields() {
        let conn = setup_db();
        let ds = insert_dataset(&conn, "ds", "t").unwrap();
        let original = sample("excel", UiId::Text("pr_7".to_string()));

        insert_sample(&conn, ds, &original).unwrap();

        let fetched = list_samples(&conn, ds).unwrap();
        assert_eq!(fetched, vec![original]);
        assert_eq!(count_samples(&conn, ds).unwrap(), 1);
    }

    #[test]
    fn test_deleting_dataset_cascades() {
        let conn = setup_db();
        let ds = insert_dataset(&conn, "ds", "t").unwrap();
        insert_sample(&conn, ds, &sample("excel", UiId::Int(1))).unwrap();
        upsert_view(
            &conn,
            ds,
            "v",
            &GroupedView {
                group_by: SampleField::Application,
                order_by: SampleField::UiId,
            },
            "t",
        )
        .unwrap();

        delete_dataset(&conn, "ds").unwrap();

        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
        let views: i64 = conn
            .query_row("SELECT COUNT(*) FROM saved_views", [], |row| row.get(0))
            .unwrap();
        assert_eq!(views, 0);
    }

    #[test]
    fn test_metadata_update() {
        let conn = setup_db();
        let ds = insert_dataset(&conn, "ds", "t").unwrap();
        let s = sample("excel", UiId::Int(1));
        insert_sample(&conn, ds, &s).unwrap();

        let pending = list_samples_missing_metadata(&conn, ds).unwrap();
        assert_eq!(pending, vec![(s.id.clone(), s.filepath.clone())]);

        let meta = ImageMetadata {
            size_bytes: 10,
            mime_type: Some("image/png".to_string()),
            width: 4,
            height: 3,
            num_channels: 4,
        };
        update_sample_metadata(&conn, &s.id, &meta).unwrap();

        assert!(list_samples_missing_metadata(&conn, ds).unwrap().is_empty());
        assert_eq!(list_samples(&conn, ds).unwrap()[0].metadata, Some(meta));
    }

    #[test]
    fn test_corrupt_metadata_column_is_an_error() {
        let conn = setup_db();
        let ds = insert_dataset(&conn, "ds", "t").unwrap();
        let s = sample("excel", UiId::Int(1));
        insert_sample(&conn, ds, &s).unwrap();
        conn.execute(
            "UPDATE samples SET metadata = '{bad' WHERE id = ?1",
            params![s.id],
        )
        .unwrap();

        assert!(matches!(
            list_samples(&conn, ds),
            Err(AppError::Database(
                rusqlite::Error::FromSqlConversionFailure(12, _, _)
            ))
        ));
    }

    #[test]
    fn test_grouped_listing_orders_by_group_then_field() {
        let conn = setup_db();
        let ds = insert_dataset(&conn, "ds", "t").unwrap();
        insert_sample(&conn, ds, &sample("word", UiId::Int(2))).unwrap();
        insert_sample(&conn, ds, &sample("excel", UiId::Int(9))).unwrap();
        insert_sample(&conn, ds, &sample("word", UiId::Int(1))).unwrap();
        insert_sample(&conn, ds, &sample("excel", UiId::Int(3))).unwrap();

        let view = GroupedView {
            group_by: SampleField::Application,
            order_by: SampleField::UiId,
        };
        let listed: Vec<(String, UiId)> = list_samples_grouped(&conn, ds, &view)
            .unwrap()
            .into_iter()
            .map(|s| (s.application.label, s.ui_id))
            .collect();

        assert_eq!(
            listed,
            vec![
                ("excel".to_string(), UiId::Int(3)),
                ("excel".to_string(), UiId::Int(9)),
                ("word".to_string(), UiId::Int(1)),
                ("word".to_string(), UiId::Int(2)),
            ]
        );
    }

    #[test]
    fn test_field_registration_is_idempotent() {
        let conn = setup_db();
        let ds = insert_dataset(&conn, "ds", "t").unwrap();
        let field = FieldSchema {
            path: "action_detection.bounding_box".to_string(),
            kind: FieldKind::List(Box::new(FieldKind::Float)),
            dynamic: true,
        };

        assert!(insert_field_if_absent(&conn, ds, &field).unwrap());
        assert!(!insert_field_if_absent(&conn, ds, &field).unwrap());
        assert_eq!(list_fields(&conn, ds).unwrap(), vec![field]);
    }

    #[test]
    fn test_view_crud() {
        let conn = setup_db();
        let ds = insert_dataset(&conn, "ds", "t").unwrap();
        let view = GroupedView {
            group_by: SampleField::Platform,
            order_by: SampleField::Filepath,
        };

        assert!(get_view(&conn, ds, "by_platform").unwrap().is_none());
        upsert_view(&conn, ds, "by_platform", &view, "t").unwrap();
        assert_eq!(get_view(&conn, ds, "by_platform").unwrap(), Some(view));
        assert_eq!(list_view_names(&conn, ds).unwrap(), vec!["by_platform"]);
    }
}
