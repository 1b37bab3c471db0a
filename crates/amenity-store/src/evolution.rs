//! Flat-store header reconciliation.
//!
//! The flat store is a CSV file with a fixed header, so its column set
//! can only grow by rewriting the file. This module owns the header
//! model and the diffing that decides when a rewrite is needed:
//!
//! - [`FlatHeader`]: ordered set of columns, base columns first
//! - [`FlatHeader::missing`]: name-based diff of incoming keys against
//!   the header (a non-empty result is a schema growth event)
//! - [`FlatHeader::pad_row`]: widens a stored row to the current header,
//!   filling new amenity columns with `0`
//!
//! Columns are only ever appended. Existing positions never move, which
//! keeps every stored row readable under the new header without touching
//! its values.

use std::collections::{BTreeSet, HashSet};

use crate::error::PersistenceError;

/// Metadata columns leading every flat-store row, in order.
pub const BASE_COLUMNS: [&str; 3] = ["image_name", "image_path", "description"];

/// Cell value for an absent amenity.
pub const ABSENT: &str = "0";

/// Cell value for a present amenity.
pub const PRESENT: &str = "1";

/// Ordered, duplicate-free flat-store header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatHeader {
    columns: Vec<String>,
    index: HashSet<String>,
}

impl FlatHeader {
    /// Header for a new flat store: base columns, then `keys` sorted.
    #[must_use]
    pub fn seeded<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|k| !is_base_column(k))
            .collect();
        let columns: Vec<String> = BASE_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(sorted)
            .collect();
        let index = columns.iter().cloned().collect();
        Self { columns, index }
    }

    /// Parses a header read from an existing flat store.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::CorruptFlatStore`] if the header does not
    /// start with [`BASE_COLUMNS`] or repeats a column.
    pub fn parse<'a, I>(fields: I) -> Result<Self, PersistenceError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let columns: Vec<String> = fields.into_iter().map(str::to_string).collect();
        if columns.len() < BASE_COLUMNS.len()
            || columns.iter().zip(BASE_COLUMNS).any(|(c, b)| c != b)
        {
            return Err(PersistenceError::CorruptFlatStore(format!(
                "header must start with {}, found {:?}",
                BASE_COLUMNS.join(","),
                columns.iter().take(BASE_COLUMNS.len()).collect::<Vec<_>>()
            )));
        }
        let mut index = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !index.insert(column.clone()) {
                return Err(PersistenceError::CorruptFlatStore(format!(
                    "duplicate column '{column}'"
                )));
            }
        }
        Ok(Self { columns, index })
    }

    /// All columns in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Amenity columns in order (everything after the base columns).
    #[must_use]
    pub fn amenity_columns(&self) -> &[String] {
        &self.columns[BASE_COLUMNS.len()..]
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always `false`: a header holds at least the base columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether `column` is part of the header.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.index.contains(column)
    }

    /// Keys not yet present as columns, sorted and de-duplicated.
    #[must_use]
    pub fn missing<'a, I>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let missing: BTreeSet<&str> = keys
            .into_iter()
            .filter(|k| !is_base_column(k) && !self.contains(k))
            .collect();
        missing.into_iter().map(str::to_string).collect()
    }

    /// Appends new columns at the end. Columns already present are ignored.
    pub fn extend<I>(&mut self, columns: I)
    where
        I: IntoIterator<Item = String>,
    {
        for column in columns {
            if self.index.insert(column.clone()) {
                self.columns.push(column);
            }
        }
    }

    /// Widens a stored row to the header length.
    ///
    /// Missing amenity cells become [`ABSENT`]; missing base cells become
    /// empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::CorruptFlatStore`] if the row has more
    /// cells than the header has columns.
    pub fn pad_row(&self, mut row: Vec<String>) -> Result<Vec<String>, PersistenceError> {
        if row.len() > self.columns.len() {
            return Err(PersistenceError::CorruptFlatStore(format!(
                "row has {} cells but header has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        while row.len() < self.columns.len() {
            let cell = if row.len() < BASE_COLUMNS.len() {
                String::new()
            } else {
                ABSENT.to_string()
            };
            row.push(cell);
        }
        Ok(row)
    }

    /// Position of a column.
    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        if !self.contains(column) {
            return None;
        }
        self.columns.iter().position(|c| c == column)
    }
}

/// Whether `name` is one of the [`BASE_COLUMNS`].
#[must_use]
pub fn is_base_column(name: &str) -> bool {
    BASE_COLUMNS.contains(&name)
}

/// Renders a presence flag as a flat-store cell.
#[must_use]
pub fn presence_cell(present: bool) -> &'static str {
    if present {
        PRESENT
    } else {
        ABSENT
    }
}
