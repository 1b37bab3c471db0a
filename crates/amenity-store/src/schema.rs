//! Room → amenity vocabulary.
//!
//! An [`AmenitySchema`] is the static, per-run registry of recognized
//! amenities. It is handed to the store at initialization and never held
//! as global state. Flat-store column keys are `"{room}_{amenity}"`, see
//! [`column_key`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Builds the flat column key for a room/amenity pair.
#[must_use]
pub fn column_key(room: &str, amenity: &str) -> String {
    format!("{room}_{amenity}")
}

/// Mapping from room type to an ordered, duplicate-free list of amenities.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct AmenitySchema {
    rooms: BTreeMap<String, Vec<String>>,
}

impl AmenitySchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from `(room, amenities)` pairs.
    ///
    /// Duplicate amenities within a room are dropped (first wins); repeated
    /// rooms are merged.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] if a room or amenity name is empty.
    pub fn from_rooms<R, A, I>(rooms: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (R, Vec<A>)>,
        R: Into<String>,
        A: Into<String>,
    {
        let mut schema = Self::new();
        for (room, amenities) in rooms {
            let room = room.into();
            if room.trim().is_empty() {
                return Err(SchemaError::Invalid("empty room name".into()));
            }
            for amenity in amenities {
                let amenity = amenity.into();
                if amenity.trim().is_empty() {
                    return Err(SchemaError::Invalid(format!(
                        "empty amenity name in room '{room}'"
                    )));
                }
                schema.insert(&room, &amenity);
            }
            schema.rooms.entry(room).or_default();
        }
        Ok(schema)
    }

    /// The built-in vocabulary used when no schema file is configured.
    #[must_use]
    pub fn standard() -> Self {
        const STANDARD: &[(&str, &[&str])] = &[
            (
                "kitchen",
                &[
                    "refrigerator", "fridge", "oven", "microwave", "dishwasher", "sink",
                    "stove", "toaster", "blender", "kettle", "coffee_maker", "cutlery",
                    "utensils", "plates", "bowls", "bar_counter", "washing_machine",
                ],
            ),
            (
                "living_room",
                &[
                    "sofa", "tv", "coffee_table", "bookshelf", "fireplace", "armchair",
                    "entertainment_center", "speaker_system", "gaming_console",
                    "air_conditioner", "ceiling_fan", "smart_home_system", "projector",
                ],
            ),
            (
                "bedroom",
                &[
                    "bed", "wardrobe", "dresser", "nightstand", "desk", "chair", "tv",
                    "mirror", "air_conditioner", "ceiling_fan", "lamp", "alarm_clock",
                ],
            ),
            (
                "bathroom",
                &[
                    "toilet", "shower", "bathtub", "sink", "mirror", "towel_rack",
                    "hair_dryer", "washing_machine", "dryer",
                ],
            ),
            (
                "outdoor",
                &[
                    "patio", "balcony", "garden", "pool", "hot_tub", "bbq_grill",
                    "outdoor_furniture", "parking_space",
                ],
            ),
            (
                "common",
                &[
                    "wifi", "heating", "air_conditioning", "smoke_detector",
                    "security_camera", "elevator", "wheelchair_accessible",
                ],
            ),
        ];

        let mut schema = Self::new();
        for (room, amenities) in STANDARD {
            for amenity in *amenities {
                schema.insert(room, amenity);
            }
        }
        schema
    }

    /// Loads a schema from a JSON file of the form `{"room": ["amenity", ...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let data = std::fs::read(path.as_ref())?;
        let schema: Self = serde_json::from_slice(&data)?;
        Ok(schema)
    }

    /// Loads the schema file if one is given, falling back to
    /// [`standard`](Self::standard) when it is absent or unreadable.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::standard();
        };
        match Self::from_json_file(path) {
            Ok(schema) => {
                tracing::info!(path = %path.display(), rooms = schema.room_count(), "Loaded amenity schema");
                schema
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Error loading amenity schema, using the standard schema"
                );
                Self::standard()
            }
        }
    }

    /// Adds an amenity to a room. Returns `false` if it was already present.
    pub fn insert(&mut self, room: &str, amenity: &str) -> bool {
        let amenities = self.rooms.entry(room.to_string()).or_default();
        if amenities.iter().any(|a| a == amenity) {
            return false;
        }
        amenities.push(amenity.to_string());
        true
    }

    /// Room names in sorted order.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    /// Number of rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Amenities for a room, in declaration order.
    #[must_use]
    pub fn amenities(&self, room: &str) -> &[String] {
        self.rooms.get(room).map_or(&[], Vec::as_slice)
    }

    /// Iterates every `(room, amenity)` pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rooms
            .iter()
            .flat_map(|(room, amenities)| amenities.iter().map(move |a| (room.as_str(), a.as_str())))
    }

    /// Whether the schema lists the pair.
    #[must_use]
    pub fn contains(&self, room: &str, amenity: &str) -> bool {
        self.amenities(room).iter().any(|a| a == amenity)
    }

    /// Sorted cross-product of `{room}_{amenity}` keys.
    #[must_use]
    pub fn column_keys(&self) -> Vec<String> {
        let keys: BTreeSet<String> = self.pairs().map(|(r, a)| column_key(r, a)).collect();
        keys.into_iter().collect()
    }

    /// Sorted, de-duplicated bare amenity names across all rooms.
    #[must_use]
    pub fn vocabulary(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.pairs().map(|(_, a)| a).collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Whether the schema has no rooms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for AmenitySchema {
    type Error = SchemaError;

    fn try_from(rooms: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        Self::from_rooms(rooms)
    }
}

impl From<AmenitySchema> for BTreeMap<String, Vec<String>> {
    fn from(schema: AmenitySchema) -> Self {
        schema.rooms
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn small() -> AmenitySchema {
        AmenitySchema::from_rooms([("kitchen", vec!["sink", "oven"]), ("bedroom", vec!["bed"])])
            .unwrap()
    }

    #[test]
    fn test_column_keys_sorted_cross_product() {
        assert_eq!(
            small().column_keys(),
            vec!["bedroom_bed", "kitchen_oven", "kitchen_sink"]
        );
    }

    #[test]
    fn test_amenity_order_preserved_and_deduplicated() {
        let schema =
            AmenitySchema::from_rooms([("kitchen", vec!["sink", "oven", "sink"])]).unwrap();
        assert_eq!(schema.amenities("kitchen"), ["sink", "oven"]);
        assert!(schema.amenities("garage").is_empty());
    }

    #[test]
    fn test_vocabulary_deduplicates_across_rooms() {
        let schema = AmenitySchema::from_rooms([
            ("kitchen", vec!["sink"]),
            ("bathroom", vec!["sink", "mirror"]),
        ])
        .unwrap();
        assert_eq!(schema.vocabulary(), vec!["mirror", "sink"]);
        assert_eq!(schema.column_keys().len(), 3);
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(AmenitySchema::from_rooms([("", vec!["sink"])]).is_err());
        assert!(AmenitySchema::from_rooms([("kitchen", vec![" "])]).is_err());
    }

    #[test]
    fn test_standard_schema_shape() {
        let schema = AmenitySchema::standard();
        assert_eq!(schema.room_count(), 6);
        assert!(schema.contains("bedroom", "tv"));
        assert!(schema.contains("living_room", "tv"));
        assert!(schema.column_keys().contains(&"common_wifi".to_string()));
    }

    #[test]
    fn test_json_file_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"kitchen": ["sink"], "bedroom": ["bed", "lamp"]}}"#).unwrap();
        let schema = AmenitySchema::from_json_file(file.path()).unwrap();
        assert_eq!(schema.column_keys(), vec!["bedroom_bed", "bedroom_lamp", "kitchen_sink"]);
    }

    #[test]
    fn test_load_falls_back_to_standard() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(AmenitySchema::load(Some(&missing)), AmenitySchema::standard());
        assert_eq!(AmenitySchema::load(None), AmenitySchema::standard());
    }

    #[test]
    fn test_json_serialize_matches_input_shape() {
        let json = serde_json::to_value(small()).unwrap();
        assert_eq!(json["kitchen"], serde_json::json!(["sink", "oven"]));
    }
}
