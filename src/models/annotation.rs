use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Identifier of a UI element. Annotation files mix numeric and string ids, so
/// both are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UiId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for UiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl ToSql for UiId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Int(n) => n.to_sql(),
            Self::Text(s) => s.to_sql(),
        }
    }
}

impl FromSql for UiId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(Self::Int(n)),
            ValueRef::Text(_) => String::column_result(value).map(Self::Text),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// One UI element as it appears in a ScreenSpot-Pro annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub id: UiId,
    pub img_filename: String,
    /// `[width, height]` in pixels.
    pub img_size: [u32; 2],
    /// `[x1, y1, x2, y2]` in absolute pixels.
    pub bbox: [f64; 4],
    pub ui_type: String,
    pub instruction: String,
    pub application: String,
    pub group: String,
    pub platform: String,
}
