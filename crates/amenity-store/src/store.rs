//! The result store: one handle over the flat and relational stores.

use arrow::array::RecordBatch;
use chrono::Utc;
use parking_lot::Mutex;

use crate::config::StoreConfig;
use crate::detection::{AmenitiesByRoom, DetectionResult, FlatAmenities};
use crate::error::{InitError, PersistenceError};
use crate::flat::{FlatStore, FlatWrite};
use crate::query::{empty_wide_table, ImageSummary};
use crate::relational::RelationalStore;
use crate::schema::AmenitySchema;

/// Persists detection results to both stores and serves read-back views.
///
/// Writes go to the relational store first, then to the flat store; both
/// happen on every save. The stores are kept equivalent by being fed the
/// same arguments, not by a shared transaction.
///
/// `save` calls are serialized by an internal lock, so a store can be
/// shared across threads of one process. Separate processes writing the
/// same output directory are not coordinated.
#[derive(Debug)]
pub struct AmenityStore {
    config: StoreConfig,
    schema: AmenitySchema,
    seed_keys: Vec<String>,
    flat: FlatStore,
    relational: RelationalStore,
    write_lock: Mutex<()>,
}

impl AmenityStore {
    /// Prepares the output directory and database tables.
    ///
    /// Existing data is kept, so calling this repeatedly against the same
    /// directory is safe.
    pub fn initialize(config: StoreConfig, schema: AmenitySchema) -> Result<Self, InitError> {
        std::fs::create_dir_all(&config.output_dir).map_err(|source| InitError::CreateDir {
            path: config.output_dir.clone(),
            source,
        })?;
        let relational = RelationalStore::open(config.db_path())?;
        let flat = FlatStore::new(config.flat_path(), config.flat_row_policy);
        let seed_keys = schema.column_keys();

        tracing::info!(
            output_dir = %config.output_dir.display(),
            amenity_columns = seed_keys.len(),
            flat_row_policy = %config.flat_row_policy,
            "Data storage initialized"
        );

        Ok(Self {
            config,
            schema,
            seed_keys,
            flat,
            relational,
            write_lock: Mutex::new(()),
        })
    }

    /// Saves one image's detection, stamped with the current time.
    pub fn save(
        &self,
        image_path: &str,
        amenities: &AmenitiesByRoom,
        description: &str,
        flat_amenities: &FlatAmenities,
    ) -> Result<(), PersistenceError> {
        let result = DetectionResult {
            image_path: image_path.to_string(),
            description: description.to_string(),
            processed_at: Utc::now(),
            amenities: amenities.clone(),
            flat_amenities: flat_amenities.clone(),
        };
        self.save_result(&result)
    }

    /// Saves a complete record, keeping its `processed_at`.
    pub fn save_result(&self, result: &DetectionResult) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();

        let image_id = self.relational.upsert(result)?;
        let outcome = self.flat.write(
            &result.image_path,
            &result.description,
            &result.flat_amenities,
            &self.seed_keys,
        )?;

        if let FlatWrite::Rewritten {
            added_columns,
            replaced,
            rows,
        } = &outcome
        {
            if !added_columns.is_empty() {
                tracing::info!(
                    image_path = %result.image_path,
                    added = ?added_columns,
                    rows,
                    "Flat store schema grew"
                );
            }
            if *replaced {
                tracing::debug!(image_path = %result.image_path, "Replaced flat store row");
            }
        }

        tracing::info!(
            image_path = %result.image_path,
            image_id,
            "Results saved to database and flat store"
        );
        Ok(())
    }

    /// One row per image with its present-amenity count, highest first.
    ///
    /// Read failures are logged and yield an empty list.
    #[must_use]
    pub fn summary(&self) -> Vec<ImageSummary> {
        match self.relational.summary() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Error retrieving results summary");
                Vec::new()
            }
        }
    }

    /// The wide results table.
    ///
    /// Served from the flat store when it reads cleanly, otherwise rebuilt
    /// from the relational store. If both fail the table is empty but keeps
    /// the metadata columns.
    #[must_use]
    pub fn all_results(&self) -> RecordBatch {
        let flat = {
            let _guard = self.write_lock.lock();
            self.flat.read_table()
        };
        match flat {
            Ok(batch) => return batch,
            Err(e) => tracing::warn!(
                path = %self.flat.path().display(),
                error = %e,
                "Error reading flat store, rebuilding from database"
            ),
        }

        match self.relational.wide_table(&self.seed_keys) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "Error reconstructing results from database");
                empty_wide_table()
            }
        }
    }

    /// Store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Amenity schema the store was initialized with.
    #[must_use]
    pub fn schema(&self) -> &AmenitySchema {
        &self.schema
    }
}
