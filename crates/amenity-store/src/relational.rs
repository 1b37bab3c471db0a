//! SQLite relational store.
//!
//! ```text
//! images(id, image_path UNIQUE, description, processed_at)
//!   ▲
//!   └── amenity_facts(id, image_id, room_type, amenity_name, is_present,
//!                     UNIQUE(image_id, room_type, amenity_name))
//! ```
//!
//! Every operation opens its own connection and drops it before
//! returning. A save runs in one transaction: if any statement fails the
//! transaction is dropped and rolled back, so an image's facts land
//! all together or not at all.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrow::array::RecordBatch;
use rusqlite::{params, Connection, OpenFlags};

use crate::detection::{image_name, DetectionResult};
use crate::error::{InitError, PersistenceError, QueryError};
use crate::query::{ImageSummary, WideTableBuilder};
use crate::schema::column_key;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_path TEXT NOT NULL UNIQUE,
    description TEXT,
    processed_at TEXT
);
CREATE TABLE IF NOT EXISTS amenity_facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_id INTEGER NOT NULL REFERENCES images (id),
    room_type TEXT NOT NULL,
    amenity_name TEXT NOT NULL,
    is_present INTEGER NOT NULL,
    UNIQUE (image_id, room_type, amenity_name)
);
";

const UPSERT_IMAGE: &str = "
INSERT INTO images (image_path, description, processed_at) VALUES (?1, ?2, ?3)
ON CONFLICT (image_path) DO UPDATE SET
    description = excluded.description,
    processed_at = excluded.processed_at
";

const CLEAR_FACTS: &str = "DELETE FROM amenity_facts WHERE image_id = ?1";

const UPSERT_FACT: &str = "
INSERT INTO amenity_facts (image_id, room_type, amenity_name, is_present) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (image_id, room_type, amenity_name) DO UPDATE SET
    is_present = excluded.is_present
";

const SUMMARY: &str = "
SELECT i.image_path,
       COALESCE(i.description, ''),
       COALESCE(SUM(CASE WHEN f.is_present = 1 THEN 1 ELSE 0 END), 0) AS amenity_count
FROM images i
LEFT JOIN amenity_facts f ON f.image_id = i.id
GROUP BY i.id, i.image_path, i.description
ORDER BY amenity_count DESC, i.image_path ASC
";

/// Normalized images/facts store backed by one SQLite file.
#[derive(Debug, Clone)]
pub struct RelationalStore {
    path: PathBuf,
}

impl RelationalStore {
    /// Opens the database, creating the file and tables if needed.
    /// Existing rows are kept.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, InitError> {
        let store = Self { path: path.into() };
        let conn = store.connect()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(store)
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the image row and all of its facts in one transaction.
    ///
    /// Facts from an earlier save of the same path are dropped first, so
    /// keys missing from `result` do not survive. Returns the image id,
    /// which is stable across re-saves of a path.
    pub fn upsert(&self, result: &DetectionResult) -> Result<i64, PersistenceError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            UPSERT_IMAGE,
            params![
                result.image_path,
                result.description,
                result.processed_at.to_rfc3339()
            ],
        )?;
        let image_id: i64 = tx.query_row(
            "SELECT id FROM images WHERE image_path = ?1",
            params![result.image_path],
            |row| row.get(0),
        )?;
        tx.execute(CLEAR_FACTS, params![image_id])?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_FACT)?;
            for (room, amenities) in &result.amenities {
                for (amenity, present) in amenities {
                    stmt.execute(params![image_id, room, amenity, present])?;
                }
            }
        }
        tx.commit()?;
        Ok(image_id)
    }

    /// Per-image present-amenity counts, highest first.
    pub fn summary(&self) -> Result<Vec<ImageSummary>, QueryError> {
        let conn = self.connect_read_only()?;
        let mut stmt = conn.prepare(SUMMARY)?;
        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(2)?;
            Ok(ImageSummary {
                image_path: row.get(0)?,
                description: row.get(1)?,
                amenity_count: u64::try_from(count).unwrap_or_default(),
            })
        })?;
        let summary = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(summary)
    }

    /// Rebuilds the wide table by pivoting facts into `{room}_{amenity}`
    /// columns.
    ///
    /// Columns are the union of `seed_keys` and every observed fact key,
    /// sorted. Rows follow image insertion order; cells without a fact
    /// are `0`.
    pub fn wide_table(&self, seed_keys: &[String]) -> Result<RecordBatch, QueryError> {
        let conn = self.connect_read_only()?;

        let mut stmt = conn.prepare("SELECT id, image_path, description FROM images ORDER BY id")?;
        let images = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns: BTreeSet<String> = seed_keys.iter().cloned().collect();
        let mut facts: HashMap<i64, HashMap<String, i64>> = HashMap::new();
        let mut stmt = conn
            .prepare("SELECT image_id, room_type, amenity_name, is_present FROM amenity_facts")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let image_id: i64 = row.get(0)?;
            let room: String = row.get(1)?;
            let amenity: String = row.get(2)?;
            let present: bool = row.get(3)?;
            let key = column_key(&room, &amenity);
            columns.insert(key.clone());
            facts
                .entry(image_id)
                .or_default()
                .insert(key, i64::from(present));
        }

        let mut builder = WideTableBuilder::new(columns.into_iter().collect());
        for (id, path, description) in images {
            let image_facts = facts.get(&id);
            let values: Vec<i64> = builder
                .amenity_columns()
                .iter()
                .map(|c| image_facts.and_then(|f| f.get(c)).copied().unwrap_or(0))
                .collect();
            builder.push_row(
                image_name(&path),
                &path,
                description.as_deref().unwrap_or_default(),
                values,
            );
        }
        builder.finish()
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.path)?;
        Self::configure(&conn)?;
        Ok(conn)
    }

    fn connect_read_only(&self) -> Result<Connection, rusqlite::Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn configure(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }
}
