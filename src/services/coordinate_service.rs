use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::annotation::{AnnotationEntry, UiId};
use crate::models::sample::RelativeBox;

/// What to do with boxes that are inverted or leave their image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoxPolicy {
    /// Normalise the corners as given, even if the result leaves `[0, 1]`.
    #[default]
    PassThrough,
    /// Reorder swapped corners and clip them to the image before normalising.
    Clamp,
    /// Fail the run with `InvalidBoundingBox`.
    Reject,
}

impl std::fmt::Display for BoxPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PassThrough => write!(f, "pass-through"),
            Self::Clamp => write!(f, "clamp"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for BoxPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass-through" | "passthrough" => Ok(Self::PassThrough),
            "clamp" => Ok(Self::Clamp),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("unknown bounding box policy: {s}")),
        }
    }
}

/// `[x1, y1, x2, y2]` over a `[width, height]` image to `[x, y, w, h]` in image
/// fractions. Assumes non-zero dimensions; no clamping.
pub fn to_relative(bbox: [f64; 4], img_size: [u32; 2]) -> RelativeBox {
    let [x1, y1, x2, y2] = bbox;
    let width = f64::from(img_size[0]);
    let height = f64::from(img_size[1]);

    RelativeBox {
        x: x1 / width,
        y: y1 / height,
        width: (x2 - x1) / width,
        height: (y2 - y1) / height,
    }
}

/// Inverse of [`to_relative`].
pub fn to_absolute(rel: RelativeBox, img_size: [u32; 2]) -> [f64; 4] {
    let width = f64::from(img_size[0]);
    let height = f64::from(img_size[1]);
    let x1 = rel.x * width;
    let y1 = rel.y * height;
    [x1, y1, x1 + rel.width * width, y1 + rel.height * height]
}

fn is_well_formed(bbox: [f64; 4], img_size: [u32; 2]) -> bool {
    let [x1, y1, x2, y2] = bbox;
    let (w, h) = (f64::from(img_size[0]), f64::from(img_size[1]));
    0.0 <= x1 && x1 <= x2 && x2 <= w && 0.0 <= y1 && y1 <= y2 && y2 <= h
}

fn clamp_box(bbox: [f64; 4], img_size: [u32; 2]) -> [f64; 4] {
    let [x1, y1, x2, y2] = bbox;
    let (w, h) = (f64::from(img_size[0]), f64::from(img_size[1]));
    [
        x1.min(x2).clamp(0.0, w),
        y1.min(y2).clamp(0.0, h),
        x1.max(x2).clamp(0.0, w),
        y1.max(y2).clamp(0.0, h),
    ]
}

/// Checked conversion used by the loader. Zero-sized images are always an error.
pub fn normalize(
    id: &UiId,
    bbox: [f64; 4],
    img_size: [u32; 2],
    policy: BoxPolicy,
) -> Result<RelativeBox, AppError> {
    let [width, height] = img_size;
    if width == 0 || height == 0 {
        return Err(AppError::InvalidImageSize {
            id: id.clone(),
            width,
            height,
        });
    }

    let bbox = match policy {
        BoxPolicy::PassThrough => bbox,
        BoxPolicy::Clamp => clamp_box(bbox, img_size),
        BoxPolicy::Reject if is_well_formed(bbox, img_size) => bbox,
        BoxPolicy::Reject => {
            return Err(AppError::InvalidBoundingBox {
                id: id.clone(),
                bbox,
            })
        }
    };

    Ok(to_relative(bbox, img_size))
}

pub fn normalize_entry(entry: &AnnotationEntry, policy: BoxPolicy) -> Result<RelativeBox, AppError> {
    normalize(&entry.id, entry.bbox, entry.img_size, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> UiId {
        UiId::Int(1)
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_known_conversion() {
        let rel = to_relative([100.0, 150.0, 300.0, 450.0], [800, 600]);
        assert_eq!(rel.to_array(), [0.125, 0.25, 0.25, 0.5]);
    }

    #[test]
    fn test_boxes_inside_image_stay_in_unit_range() {
        let sizes = [[1, 1], [7, 3], [1920, 1080], [3840, 2160], [13, 997]];
        for size in sizes {
            let (w, h) = (f64::from(size[0]), f64::from(size[1]));
            let corners = [
                [0.0, 0.0, w, h],
                [0.0, 0.0, 0.0, 0.0],
                [w, h, w, h],
                [w / 3.0, h / 5.0, w / 2.0, h / 1.5],
            ];
            for bbox in corners {
                let rel = normalize(&id(), bbox, size, BoxPolicy::PassThrough).unwrap();
                for v in rel.to_array() {
                    assert!((0.0..=1.0).contains(&v), "{v} out of range for {bbox:?}");
                }
                assert!(rel.x + rel.width <= 1.0 + 1e-12);
                assert!(rel.y + rel.height <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn test_denormalizing_restores_original_box() {
        let cases = [
            ([12.0, 34.0, 560.0, 78.0], [1920, 1080]),
            ([0.0, 0.0, 1.0, 1.0], [3, 7]),
            ([101.5, 33.25, 2000.75, 1999.0], [2560, 2000]),
        ];
        for (bbox, size) in cases {
            let back = to_absolute(to_relative(bbox, size), size);
            for (a, b) in back.iter().zip(bbox.iter()) {
                assert_close(*a, *b);
            }
        }
    }

    #[test]
    fn test_pass_through_keeps_out_of_range_boxes() {
        let rel = normalize(&id(), [-10.0, 0.0, 900.0, 50.0], [800, 600], BoxPolicy::PassThrough)
            .unwrap();
        assert!(rel.x < 0.0);
        assert!(rel.x + rel.width > 1.0);

        let inverted =
            normalize(&id(), [300.0, 0.0, 100.0, 10.0], [800, 600], BoxPolicy::PassThrough)
                .unwrap();
        assert!(inverted.width < 0.0);
    }

    #[test]
    fn test_clamp_reorders_and_clips() {
        let rel = normalize(&id(), [900.0, -20.0, 400.0, 300.0], [800, 600], BoxPolicy::Clamp)
            .unwrap();
        assert_close(rel.x, 0.5);
        assert_close(rel.y, 0.0);
        assert_close(rel.width, 0.5);
        assert_close(rel.height, 0.5);
    }

    #[test]
    fn test_reject_refuses_malformed_boxes() {
        let err = normalize(&id(), [300.0, 0.0, 100.0, 10.0], [800, 600], BoxPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidBoundingBox { .. }));

        assert!(normalize(&id(), [0.0, 0.0, 800.0, 600.0], [800, 600], BoxPolicy::Reject).is_ok());
    }

    #[test]
    fn test_zero_dimension_is_an_error_under_every_policy() {
        for policy in [BoxPolicy::PassThrough, BoxPolicy::Clamp, BoxPolicy::Reject] {
            let err = normalize(&id(), [0.0, 0.0, 1.0, 1.0], [0, 600], policy).unwrap_err();
            assert!(matches!(
                err,
                AppError::InvalidImageSize {
                    width: 0,
                    height: 600,
                    ..
                }
            ));
            assert!(normalize(&id(), [0.0, 0.0, 1.0, 1.0], [600, 0], policy).is_err());
        }
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("clamp".parse::<BoxPolicy>().unwrap(), BoxPolicy::Clamp);
        assert_eq!(
            "pass-through".parse::<BoxPolicy>().unwrap(),
            BoxPolicy::PassThrough
        );
        assert!("strict".parse::<BoxPolicy>().is_err());
    }
}
