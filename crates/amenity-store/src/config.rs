//! Configuration for an [`AmenityStore`](crate::AmenityStore).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the flat store places a row whose `image_path` is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlatRowPolicy {
    /// Always append. Re-processing an image leaves the older row in place.
    #[default]
    Append,
    /// Replace the existing row for the path, mirroring the relational upsert.
    ReplaceByPath,
}

impl fmt::Display for FlatRowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => f.write_str("append"),
            Self::ReplaceByPath => f.write_str("replace-by-path"),
        }
    }
}

impl FromStr for FlatRowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "replace-by-path" | "replace_by_path" | "replace" => Ok(Self::ReplaceByPath),
            other => Err(format!("unknown flat row policy '{other}'")),
        }
    }
}

/// Configuration for an amenity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding both stores. Created on initialization.
    pub output_dir: PathBuf,
    /// File name of the flat CSV store inside `output_dir`.
    /// Default: `amenities.csv`.
    pub flat_file_name: String,
    /// File name of the SQLite database inside `output_dir`.
    /// Default: `amenities.db`.
    pub db_file_name: String,
    /// Row placement on the flat store. Default: [`FlatRowPolicy::Append`].
    pub flat_row_policy: FlatRowPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            flat_file_name: "amenities.csv".into(),
            db_file_name: "amenities.db".into(),
            flat_row_policy: FlatRowPolicy::Append,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the flat row policy.
    #[must_use]
    pub fn with_flat_row_policy(mut self, policy: FlatRowPolicy) -> Self {
        self.flat_row_policy = policy;
        self
    }

    /// Set the flat store file name.
    #[must_use]
    pub fn with_flat_file_name(mut self, name: impl Into<String>) -> Self {
        self.flat_file_name = name.into();
        self
    }

    /// Set the database file name.
    #[must_use]
    pub fn with_db_file_name(mut self, name: impl Into<String>) -> Self {
        self.db_file_name = name.into();
        self
    }

    /// Full path of the flat store.
    #[must_use]
    pub fn flat_path(&self) -> PathBuf {
        self.output_dir.join(&self.flat_file_name)
    }

    /// Full path of the database.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.output_dir.join(&self.db_file_name)
    }

    /// The output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = StoreConfig::new("/tmp/run1");
        assert_eq!(config.flat_path(), PathBuf::from("/tmp/run1/amenities.csv"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/run1/amenities.db"));
        assert_eq!(config.flat_row_policy, FlatRowPolicy::Append);
    }

    #[test]
    fn test_builder_setters() {
        let config = StoreConfig::default()
            .with_output_dir("out")
            .with_flat_file_name("wide.csv")
            .with_db_file_name("facts.sqlite")
            .with_flat_row_policy(FlatRowPolicy::ReplaceByPath);
        assert_eq!(config.flat_path(), PathBuf::from("out/wide.csv"));
        assert_eq!(config.db_path(), PathBuf::from("out/facts.sqlite"));
        assert_eq!(config.flat_row_policy, FlatRowPolicy::ReplaceByPath);
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!("append".parse::<FlatRowPolicy>(), Ok(FlatRowPolicy::Append));
        assert_eq!(
            "Replace-By-Path".parse::<FlatRowPolicy>(),
            Ok(FlatRowPolicy::ReplaceByPath)
        );
        assert!("merge".parse::<FlatRowPolicy>().is_err());
        assert_eq!(FlatRowPolicy::ReplaceByPath.to_string(), "replace-by-path");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"output_dir": "runs/a", "flat_row_policy": "replace-by-path"}"#)
                .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("runs/a"));
        assert_eq!(config.flat_file_name, "amenities.csv");
        assert_eq!(config.flat_row_policy, FlatRowPolicy::ReplaceByPath);
    }
}
