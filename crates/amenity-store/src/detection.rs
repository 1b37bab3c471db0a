//! Detection results and the detector seam.
//!
//! The vision-language model lives outside this crate. It is reached
//! through the [`Detector`] trait, which yields a [`Detection`]: the
//! per-room amenity map, a free-text description and the flat
//! `{room}_{amenity}` map used as the flat-store row shape.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::schema::{column_key, AmenitySchema};

/// Room type → amenity name → presence.
pub type AmenitiesByRoom = BTreeMap<String, BTreeMap<String, bool>>;

/// `{room}_{amenity}` → presence.
pub type FlatAmenities = BTreeMap<String, bool>;

/// Output of a detector for one image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Detection {
    /// Presence per room and amenity.
    pub amenities: AmenitiesByRoom,
    /// Generated description of the property.
    pub description: String,
    /// Denormalized `{room}_{amenity}` view of `amenities`.
    pub flat_amenities: FlatAmenities,
}

impl Detection {
    /// Builds a detection from a per-room map, deriving the flat view.
    #[must_use]
    pub fn new(amenities: AmenitiesByRoom, description: impl Into<String>) -> Self {
        let flat_amenities = flatten(&amenities);
        Self {
            amenities,
            description: description.into(),
            flat_amenities,
        }
    }

    /// Present amenities grouped by room, skipping rooms with none.
    #[must_use]
    pub fn present_by_room(&self) -> BTreeMap<&str, Vec<&str>> {
        self.amenities
            .iter()
            .filter_map(|(room, amenities)| {
                let present: Vec<&str> = amenities
                    .iter()
                    .filter(|(_, p)| **p)
                    .map(|(a, _)| a.as_str())
                    .collect();
                (!present.is_empty()).then_some((room.as_str(), present))
            })
            .collect()
    }
}

/// One persisted record per processed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Unique identity of the record.
    pub image_path: String,
    /// Free-text description.
    pub description: String,
    /// When the image was processed.
    pub processed_at: DateTime<Utc>,
    /// Presence per room and amenity.
    pub amenities: AmenitiesByRoom,
    /// `{room}_{amenity}` → presence.
    pub flat_amenities: FlatAmenities,
}

impl DetectionResult {
    /// Stamps a detection for `image_path` with the current time.
    #[must_use]
    pub fn from_detection(image_path: impl Into<String>, detection: Detection) -> Self {
        Self {
            image_path: image_path.into(),
            description: detection.description,
            processed_at: Utc::now(),
            amenities: detection.amenities,
            flat_amenities: detection.flat_amenities,
        }
    }

    /// File name component of `image_path`, or the whole path if it has none.
    #[must_use]
    pub fn image_name(&self) -> &str {
        image_name(&self.image_path)
    }

    /// Number of amenities marked present.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.amenities
            .values()
            .flat_map(BTreeMap::values)
            .filter(|&&p| p)
            .count()
    }
}

/// File name component of a path string.
#[must_use]
pub fn image_name(image_path: &str) -> &str {
    Path::new(image_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(image_path)
}

/// Flattens a per-room map into `{room}_{amenity}` keys.
#[must_use]
pub fn flatten(amenities: &AmenitiesByRoom) -> FlatAmenities {
    amenities
        .iter()
        .flat_map(|(room, inner)| {
            inner
                .iter()
                .map(move |(amenity, &present)| (column_key(room, amenity), present))
        })
        .collect()
}

/// Spreads bare amenity detections over every room whose schema lists
/// the amenity. Amenities the detector did not report are `false`.
#[must_use]
pub fn assign_to_rooms(
    schema: &AmenitySchema,
    detected: &BTreeMap<String, bool>,
) -> AmenitiesByRoom {
    schema
        .rooms()
        .map(|room| {
            let inner = schema
                .amenities(room)
                .iter()
                .map(|a| (a.clone(), detected.get(a).copied().unwrap_or(false)))
                .collect();
            (room.to_string(), inner)
        })
        .collect()
}

/// Source of detections for images.
pub trait Detector {
    /// Detects amenities in the image at `image_path`.
    fn detect(&self, image_path: &Path) -> Result<Detection, DetectError>;
}

impl<D: Detector + ?Sized> Detector for &D {
    fn detect(&self, image_path: &Path) -> Result<Detection, DetectError> {
        (**self).detect(image_path)
    }
}

/// One recorded model output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordedOutput {
    /// Description produced by the model.
    #[serde(default)]
    pub description: String,
    /// Bare amenity name → presence, as answered by the model.
    #[serde(default)]
    pub detected: BTreeMap<String, bool>,
}

/// A [`Detector`] that replays recorded model outputs keyed by image
/// file name.
///
/// The recording file is a JSON object:
///
/// ```json
/// { "img1.jpg": { "description": "Cozy", "detected": { "sink": true } } }
/// ```
#[derive(Debug, Clone)]
pub struct RecordedDetector {
    schema: AmenitySchema,
    outputs: HashMap<String, RecordedOutput>,
}

impl RecordedDetector {
    /// Creates a detector from in-memory outputs.
    #[must_use]
    pub fn new(schema: AmenitySchema, outputs: HashMap<String, RecordedOutput>) -> Self {
        Self { schema, outputs }
    }

    /// Loads recorded outputs from a JSON file.
    pub fn from_json_file(
        schema: AmenitySchema,
        path: impl AsRef<Path>,
    ) -> Result<Self, DetectError> {
        let data = std::fs::read(path.as_ref())?;
        let outputs: HashMap<String, RecordedOutput> = serde_json::from_slice(&data)?;
        Ok(Self::new(schema, outputs))
    }

    /// Number of recorded images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Whether no images are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Detector for RecordedDetector {
    fn detect(&self, image_path: &Path) -> Result<Detection, DetectError> {
        let path_str = image_path.to_string_lossy();
        let output = self
            .outputs
            .get(path_str.as_ref())
            .or_else(|| self.outputs.get(image_name(&path_str)))
            .ok_or_else(|| DetectError::NotRecorded(path_str.to_string()))?;
        let amenities = assign_to_rooms(&self.schema, &output.detected);
        Ok(Detection::new(amenities, output.description.clone()))
    }
}
