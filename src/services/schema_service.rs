use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::AppError;
use crate::models::field::{FieldKind, FieldSchema};
use crate::models::sample::Sample;

/// Top-level sample fields and the document type they hold.
pub fn base_schema() -> Vec<FieldSchema> {
    let declared = [
        ("id", FieldKind::String),
        ("filepath", FieldKind::String),
        ("ui_id", FieldKind::Mixed),
        ("instruction", FieldKind::String),
        ("application", FieldKind::Embedded("Classification".to_string())),
        ("group", FieldKind::Embedded("Classification".to_string())),
        ("platform", FieldKind::Embedded("Classification".to_string())),
        ("action_detection", FieldKind::Embedded("Detection".to_string())),
        ("metadata", FieldKind::Embedded("ImageMetadata".to_string())),
        ("created_at", FieldKind::String),
    ];
    declared
        .into_iter()
        .map(|(path, kind)| FieldSchema {
            path: path.to_string(),
            kind,
            dynamic: false,
        })
        .collect()
}

fn kind_of(value: &Value) -> Option<FieldKind> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(FieldKind::Bool),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldKind::Int),
        Value::Number(_) => Some(FieldKind::Float),
        Value::String(_) => Some(FieldKind::String),
        Value::Array(items) => items
            .iter()
            .filter_map(kind_of)
            .reduce(merge)
            .map(|inner| FieldKind::List(Box::new(inner))),
        Value::Object(_) => Some(FieldKind::Embedded("object".to_string())),
    }
}

fn merge(a: FieldKind, b: FieldKind) -> FieldKind {
    match (a, b) {
        (a, b) if a == b => a,
        (FieldKind::Int, FieldKind::Float) | (FieldKind::Float, FieldKind::Int) => {
            FieldKind::Float
        }
        (FieldKind::List(a), FieldKind::List(b)) => FieldKind::List(Box::new(merge(*a, *b))),
        _ => FieldKind::Mixed,
    }
}

fn collect_paths(prefix: &str, value: &Value, out: &mut BTreeMap<String, FieldKind>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        let path = format!("{prefix}.{key}");
        if let Some(kind) = kind_of(child) {
            let merged = match out.remove(&path) {
                Some(existing) => merge(existing, kind),
                None => kind,
            };
            out.insert(path.clone(), merged);
        }
        collect_paths(&path, child, out);
    }
}

/// Attribute paths inside embedded documents (`application.label`,
/// `action_detection.bounding_box`, `metadata.width`, ...) with the kinds
/// observed across all samples.
pub fn infer_dynamic_fields(samples: &[Sample]) -> Result<BTreeMap<String, FieldKind>, AppError> {
    let mut fields = BTreeMap::new();
    for sample in samples {
        let Value::Object(doc) = serde_json::to_value(sample)? else {
            continue;
        };
        for (key, value) in &doc {
            collect_paths(key, value, &mut fields);
        }
    }
    Ok(fields)
}
