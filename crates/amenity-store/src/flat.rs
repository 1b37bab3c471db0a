//! Flat CSV store.
//!
//! One wide row per save: `image_name, image_path, description` followed
//! by one `0`/`1` column per `{room}_{amenity}` key. The header is
//! reconciled on every write (see [`crate::evolution`]):
//!
//! 1. No file yet: create it with the seed keys (the schema cross-product)
//!    plus the row's own keys, sorted.
//! 2. Row carries unseen keys: rewrite every stored row with the new
//!    columns appended and set to `0`, then add the row.
//! 3. Otherwise: append the row, filling header columns it lacks with `0`.
//!
//! Rewrites go to a temporary file next to the store and are renamed over
//! it, so an interrupted rewrite leaves the previous file intact.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use arrow::array::RecordBatch;

use crate::config::FlatRowPolicy;
use crate::detection::{image_name, FlatAmenities};
use crate::error::{PersistenceError, QueryError};
use crate::evolution::{presence_cell, FlatHeader, BASE_COLUMNS};
use crate::query::WideTableBuilder;

/// Index of `image_path` within [`BASE_COLUMNS`].
const PATH_COLUMN: usize = 1;

/// What a flat-store write did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatWrite {
    /// The store did not exist and was created.
    Created {
        /// Number of header columns.
        columns: usize,
    },
    /// The row was appended under the existing header.
    Appended,
    /// The store was rewritten.
    Rewritten {
        /// Columns added by this write (a schema growth event when non-empty).
        added_columns: Vec<String>,
        /// Whether an existing row for the same path was replaced.
        replaced: bool,
        /// Rows in the store after the write.
        rows: usize,
    },
}

/// Wide CSV store of detection rows.
#[derive(Debug, Clone)]
pub struct FlatStore {
    path: PathBuf,
    policy: FlatRowPolicy,
}

impl FlatStore {
    /// Creates a handle; nothing is touched on disk until the first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, policy: FlatRowPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// Location of the CSV file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row placement policy.
    #[must_use]
    pub fn policy(&self) -> FlatRowPolicy {
        self.policy
    }

    /// Whether the store exists with content.
    pub fn exists(&self) -> Result<bool, std::io::Error> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Reads the current header, or `None` if the store does not exist yet.
    pub fn read_header(&self) -> Result<Option<FlatHeader>, PersistenceError> {
        if !self.exists()? {
            return Ok(None);
        }
        let mut reader = self.reader()?;
        let header = FlatHeader::parse(reader.headers()?.iter())?;
        Ok(Some(header))
    }

    /// Writes one detection row, reconciling the header first.
    ///
    /// `seed_keys` seed the header when the store is created; they are the
    /// full schema cross-product so the first file already carries every
    /// known column.
    pub fn write(
        &self,
        image_path: &str,
        description: &str,
        amenities: &FlatAmenities,
        seed_keys: &[String],
    ) -> Result<FlatWrite, PersistenceError> {
        let Some(header) = self.read_header()? else {
            let header = FlatHeader::seeded(
                seed_keys
                    .iter()
                    .map(String::as_str)
                    .chain(amenities.keys().map(String::as_str)),
            );
            let row = render_row(&header, image_path, description, amenities);
            self.replace_contents(&header, std::iter::once(row))?;
            tracing::debug!(path = %self.path.display(), columns = header.len(), "Created flat store");
            return Ok(FlatWrite::Created {
                columns: header.len(),
            });
        };

        let added = header.missing(amenities.keys().map(String::as_str));
        if added.is_empty() && self.policy == FlatRowPolicy::Append {
            let row = render_row(&header, image_path, description, amenities);
            self.append(&row)?;
            return Ok(FlatWrite::Appended);
        }

        let (mut header, stored) = self.load_rows()?;
        header.extend(added.iter().cloned());
        let mut rows = stored
            .into_iter()
            .map(|row| header.pad_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        let new_row = render_row(&header, image_path, description, amenities);

        let existing = match self.policy {
            FlatRowPolicy::Append => None,
            FlatRowPolicy::ReplaceByPath => {
                rows.iter().position(|r| r[PATH_COLUMN] == image_path)
            }
        };

        if added.is_empty() && existing.is_none() {
            self.append(&new_row)?;
            return Ok(FlatWrite::Appended);
        }

        let replaced = if let Some(first) = existing {
            rows[first] = new_row;
            let mut index = 0;
            rows.retain(|r| {
                let keep = index <= first || r[PATH_COLUMN] != image_path;
                index += 1;
                keep
            });
            true
        } else {
            rows.push(new_row);
            false
        };

        let row_count = rows.len();
        self.replace_contents(&header, rows)?;
        Ok(FlatWrite::Rewritten {
            added_columns: added,
            replaced,
            rows: row_count,
        })
    }

    /// Reads the whole store as a wide Arrow table.
    ///
    /// A header without the base columns or a non-integer amenity cell is
    /// [`QueryError::Malformed`]; rows of the wrong width fail in the CSV
    /// reader.
    pub fn read_table(&self) -> Result<RecordBatch, QueryError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let header = FlatHeader::parse(reader.headers()?.iter())
            .map_err(|e| QueryError::Malformed(e.to_string()))?;

        let base = BASE_COLUMNS.len();
        let mut builder = WideTableBuilder::new(header.amenity_columns().to_vec());
        for record in reader.records() {
            let record = record?;
            let values = header
                .amenity_columns()
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let cell = record[base + i].trim();
                    cell.parse::<i64>().map_err(|_| {
                        QueryError::Malformed(format!(
                            "column '{column}' holds non-integer value '{cell}'"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder.push_row(&record[0], &record[1], &record[2], values);
        }
        builder.finish()
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>, csv::Error> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
    }

    fn load_rows(&self) -> Result<(FlatHeader, Vec<Vec<String>>), PersistenceError> {
        let mut reader = self.reader()?;
        let header = FlatHeader::parse(reader.headers()?.iter())?;
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok((header, rows))
    }

    fn append(&self, row: &[String]) -> Result<(), PersistenceError> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(row)?;
        writer.flush()?;
        Ok(())
    }

    fn replace_contents<I>(&self, header: &FlatHeader, rows: I) -> Result<(), PersistenceError>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer.write_record(header.columns())?;
            for row in rows {
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PersistenceError::Io(e.error))?;
        Ok(())
    }
}

/// Renders a row in header order. Header columns the row lacks are `0`.
fn render_row(
    header: &FlatHeader,
    image_path: &str,
    description: &str,
    amenities: &FlatAmenities,
) -> Vec<String> {
    header
        .columns()
        .iter()
        .map(|column| match column.as_str() {
            "image_name" => image_name(image_path).to_string(),
            "image_path" => image_path.to_string(),
            "description" => description.to_string(),
            key => presence_cell(amenities.get(key).copied().unwrap_or(false)).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(pairs: &[(&str, bool)]) -> FlatAmenities {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn seeds(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| (*k).to_string()).collect()
    }

    fn raw(store: &FlatStore) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(store.path())
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_first_write_seeds_full_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::Append);
        let outcome = store
            .write(
                "photos/img1.jpg",
                "Cozy",
                &flat(&[("kitchen_sink", true)]),
                &seeds(&["kitchen_sink", "bedroom_bed"]),
            )
            .unwrap();
        assert_eq!(outcome, FlatWrite::Created { columns: 5 });

        let rows = raw(&store);
        assert_eq!(
            rows[0],
            ["image_name", "image_path", "description", "bedroom_bed", "kitchen_sink"]
        );
        assert_eq!(rows[1], ["img1.jpg", "photos/img1.jpg", "Cozy", "0", "1"]);
    }

    #[test]
    fn test_first_write_keeps_keys_outside_seed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::Append);
        store
            .write("a.jpg", "", &flat(&[("attic_fan", true)]), &seeds(&["kitchen_sink"]))
            .unwrap();
        let header = store.read_header().unwrap().unwrap();
        assert_eq!(header.amenity_columns(), ["attic_fan", "kitchen_sink"]);
    }

    #[test]
    fn test_append_without_growth() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::Append);
        let seed = seeds(&["k_a", "k_b"]);
        store.write("a.jpg", "one", &flat(&[("k_a", true)]), &seed).unwrap();
        let outcome = store.write("b.jpg", "two", &flat(&[("k_b", true)]), &seed).unwrap();
        assert_eq!(outcome, FlatWrite::Appended);

        let rows = raw(&store);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], ["b.jpg", "b.jpg", "two", "0", "1"]);
    }

    #[test]
    fn test_growth_rewrites_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::Append);
        store
            .write("a.jpg", "A", &flat(&[("k1", true), ("k2", false)]), &[])
            .unwrap();
        let outcome = store
            .write("b.jpg", "B", &flat(&[("k1", false), ("k2", true), ("k3", true)]), &[])
            .unwrap();
        assert_eq!(
            outcome,
            FlatWrite::Rewritten {
                added_columns: vec!["k3".into()],
                replaced: false,
                rows: 2,
            }
        );

        let rows = raw(&store);
        assert_eq!(rows[0], ["image_name", "image_path", "description", "k1", "k2", "k3"]);
        assert_eq!(rows[1], ["a.jpg", "a.jpg", "A", "1", "0", "0"]);
        assert_eq!(rows[2], ["b.jpg", "b.jpg", "B", "0", "1", "1"]);
    }

    #[test]
    fn test_descriptions_with_delimiters_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::Append);
        let tricky = "Sunny, \"quiet\"\nwith a view";
        store.write("a.jpg", tricky, &flat(&[("k1", true)]), &[]).unwrap();
        store.write("b.jpg", "plain", &flat(&[("k2", true)]), &[]).unwrap();
        let rows = raw(&store);
        assert_eq!(rows[1][2], tricky);
        assert_eq!(rows[1].len(), 5);
    }

    #[test]
    fn test_replace_by_path_keeps_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::ReplaceByPath);
        let seed = seeds(&["k1"]);
        store.write("a.jpg", "first", &flat(&[("k1", true)]), &seed).unwrap();
        store.write("b.jpg", "other", &flat(&[("k1", true)]), &seed).unwrap();
        let outcome = store.write("a.jpg", "second", &flat(&[("k1", false)]), &seed).unwrap();
        assert_eq!(
            outcome,
            FlatWrite::Rewritten {
                added_columns: vec![],
                replaced: true,
                rows: 2,
            }
        );

        let rows = raw(&store);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], ["a.jpg", "a.jpg", "second", "0"]);
        assert_eq!(rows[2], ["b.jpg", "b.jpg", "other", "1"]);
    }

    #[test]
    fn test_replace_by_path_appends_new_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::ReplaceByPath);
        store.write("a.jpg", "", &flat(&[("k1", true)]), &[]).unwrap();
        let outcome = store.write("b.jpg", "", &flat(&[("k1", true)]), &[]).unwrap();
        assert_eq!(outcome, FlatWrite::Appended);
    }

    #[test]
    fn test_append_policy_accepts_duplicate_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::Append);
        store.write("a.jpg", "first", &flat(&[("k1", true)]), &[]).unwrap();
        store.write("a.jpg", "second", &flat(&[("k1", false)]), &[]).unwrap();
        assert_eq!(raw(&store).len(), 3);
    }

    #[test]
    fn test_corrupt_header_rejected_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "foo,bar\n1,2\n").unwrap();
        let store = FlatStore::new(&path, FlatRowPolicy::Append);
        let err = store.write("a.jpg", "", &flat(&[("k1", true)]), &[]).unwrap_err();
        assert!(matches!(err, PersistenceError::CorruptFlatStore(_)));
    }

    #[test]
    fn test_read_table_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("a.csv"), FlatRowPolicy::Append);
        store.write("a.jpg", "A", &flat(&[("k1", true)]), &[]).unwrap();
        store.write("b.jpg", "B", &flat(&[("k2", true)]), &[]).unwrap();

        let batch = store.read_table().unwrap();
        assert_eq!(batch.num_rows(), 2);
        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, ["image_name", "image_path", "description", "k1", "k2"]);
    }

    #[test]
    fn test_read_table_rejects_non_integer_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "image_name,image_path,description,k1\na,a,d,yes\n").unwrap();
        let store = FlatStore::new(&path, FlatRowPolicy::Append);
        assert!(matches!(store.read_table(), Err(QueryError::Malformed(_))));
    }

    #[test]
    fn test_read_table_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::new(dir.path().join("none.csv"), FlatRowPolicy::Append);
        assert!(store.read_table().is_err());
        assert!(store.read_header().unwrap().is_none());
    }
}
