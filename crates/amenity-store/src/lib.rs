//! # Amenity Store
//!
//! Persistence and read-back for per-image amenity detections.
//!
//! Every saved detection lands in two places:
//!
//! - a **flat store**: one wide CSV file, one row per image, one column per
//!   `{room}_{amenity}` key. The header grows as new keys show up.
//! - a **relational store**: a SQLite database with an `images` table and an
//!   `amenity_facts` table keyed by `(image_id, room_type, amenity_name)`.
//!
//! ```text
//! Detector ──▶ Detection ──▶ AmenityStore::save
//!                               ├── RelationalStore  (transaction per image)
//!                               └── FlatStore        (header reconcile + write)
//!
//! AmenityStore::summary      ◀── RelationalStore
//! AmenityStore::all_results  ◀── FlatStore, falling back to RelationalStore
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use amenity_store::{AmenitySchema, AmenityStore, StoreConfig};
//!
//! let schema = AmenitySchema::standard();
//! let store = AmenityStore::initialize(StoreConfig::new("out"), schema)?;
//! store.save("img1.jpg", &by_room, "Cozy flat", &flat)?;
//! for row in store.summary() {
//!     println!("{} {}", row.image_path, row.amenity_count);
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod detection;
pub mod error;
pub mod evolution;
pub mod flat;
pub mod pipeline;
pub mod query;
pub mod relational;
pub mod schema;
pub mod store;

pub use config::{FlatRowPolicy, StoreConfig};
pub use detection::{
    assign_to_rooms, flatten, image_name, AmenitiesByRoom, Detection, DetectionResult, Detector,
    FlatAmenities, RecordedDetector, RecordedOutput,
};
pub use error::{DetectError, InitError, PersistenceError, PipelineError, QueryError, SchemaError};
pub use evolution::{FlatHeader, BASE_COLUMNS};
pub use flat::{FlatStore, FlatWrite};
pub use pipeline::{image_files, AmenityPipeline, SUPPORTED_EXTENSIONS};
pub use query::{column_names, empty_wide_table, wide_schema, ImageSummary, WideTableBuilder};
pub use relational::RelationalStore;
pub use schema::{column_key, AmenitySchema};
pub use store::AmenityStore;
