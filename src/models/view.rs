use serde::{Deserialize, Serialize};

use crate::models::sample::Sample;

/// Sample fields a view can group or sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleField {
    Filepath,
    UiId,
    Instruction,
    Application,
    Group,
    Platform,
    DetectionLabel,
}

impl SampleField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Filepath => "filepath",
            Self::UiId => "ui_id",
            Self::Instruction => "instruction",
            Self::Application => "application",
            Self::Group => "group_label",
            Self::Platform => "platform",
            Self::DetectionLabel => "detection_label",
        }
    }

    /// Classification-valued fields; only these can key a grouping.
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            Self::Application | Self::Group | Self::Platform | Self::DetectionLabel
        )
    }
}

impl std::fmt::Display for SampleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filepath => write!(f, "filepath"),
            Self::UiId => write!(f, "ui_id"),
            Self::Instruction => write!(f, "instruction"),
            Self::Application => write!(f, "application.label"),
            Self::Group => write!(f, "group.label"),
            Self::Platform => write!(f, "platform.label"),
            Self::DetectionLabel => write!(f, "action_detection.label"),
        }
    }
}

impl std::str::FromStr for SampleField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filepath" => Ok(Self::Filepath),
            "ui_id" => Ok(Self::UiId),
            "instruction" => Ok(Self::Instruction),
            "application" | "application.label" => Ok(Self::Application),
            "group" | "group.label" => Ok(Self::Group),
            "platform" | "platform.label" => Ok(Self::Platform),
            "action_detection.label" | "detection_label" => Ok(Self::DetectionLabel),
            _ => Err(format!("unknown sample field: {s}")),
        }
    }
}

/// Stored definition of a grouped view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedView {
    pub group_by: SampleField,
    pub order_by: SampleField,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleGroup {
    pub key: String,
    pub samples: Vec<Sample>,
}
