use serde::{Deserialize, Serialize};

use crate::models::annotation::UiId;

/// `[x, y, width, height]` relative to the image size. Components are in
/// `[0, 1]` for boxes that lie inside their image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeBox {
    pub fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
}

impl Classification {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(with = "box_as_array")]
    pub bounding_box: RelativeBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub width: u32,
    pub height: u32,
    pub num_channels: u8,
}

/// A single image with one located UI element and its labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub filepath: String,
    pub ui_id: UiId,
    pub instruction: String,
    pub application: Classification,
    pub group: Classification,
    pub platform: Classification,
    pub action_detection: Detection,
    pub metadata: Option<ImageMetadata>,
    pub created_at: String,
}

// Stored and exported as a plain 4-element list.
mod box_as_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::RelativeBox;

    pub fn serialize<S: Serializer>(b: &RelativeBox, s: S) -> Result<S::Ok, S::Error> {
        b.to_array().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RelativeBox, D::Error> {
        let [x, y, width, height] = <[f64; 4]>::deserialize(d)?;
        Ok(RelativeBox {
            x,
            y,
            width,
            height,
        })
    }
}
