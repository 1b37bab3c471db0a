//! Application configuration: a JSON file plus command-line overrides.

use std::path::{Path, PathBuf};

use amenity_store::{FlatRowPolicy, StoreConfig};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Settings for one `amenity` invocation.
///
/// ```json
/// {
///   "store": { "output_dir": "output", "flat_row_policy": "append" },
///   "schema_file": "amenities.json"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Result store settings.
    pub store: StoreConfig,
    /// Room/amenity vocabulary file. The built-in vocabulary is used when unset.
    pub schema_file: Option<PathBuf>,
}

impl AppConfig {
    /// Loads the config file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read(path).map_err(|source| CliError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_slice(&data).map_err(|source| CliError::ParseFile {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Applies command-line overrides. `None` keeps the file value.
    #[must_use]
    pub fn with_overrides(
        mut self,
        output_dir: Option<PathBuf>,
        schema_file: Option<PathBuf>,
        flat_row_policy: Option<FlatRowPolicy>,
    ) -> Self {
        if let Some(dir) = output_dir {
            self.store = self.store.with_output_dir(dir);
        }
        if let Some(policy) = flat_row_policy {
            self.store = self.store.with_flat_row_policy(policy);
        }
        if schema_file.is_some() {
            self.schema_file = schema_file;
        }
        self
    }
}
