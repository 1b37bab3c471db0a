//! Read-side shapes: per-image summaries and the wide results table.
//!
//! The wide table is an Arrow [`RecordBatch`] with the three metadata
//! columns as `Utf8` followed by one `Int64` (`0`/`1`) column per
//! `{room}_{amenity}` key. Both the flat store and the relational pivot
//! produce it through [`WideTableBuilder`], so consumers see one shape
//! whichever source served the read.

use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::evolution::BASE_COLUMNS;

/// One row of the results summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    /// Image identity.
    pub image_path: String,
    /// Stored description.
    pub description: String,
    /// Number of amenities marked present.
    pub amenity_count: u64,
}

/// Arrow schema of the wide table for the given amenity columns.
#[must_use]
pub fn wide_schema(amenity_columns: &[String]) -> SchemaRef {
    let fields: Vec<Field> = BASE_COLUMNS
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, false))
        .chain(
            amenity_columns
                .iter()
                .map(|name| Field::new(name, DataType::Int64, false)),
        )
        .collect();
    Arc::new(Schema::new(fields))
}

/// An empty wide table carrying only the metadata columns.
#[must_use]
pub fn empty_wide_table() -> RecordBatch {
    RecordBatch::new_empty(wide_schema(&[]))
}

/// Column names of a table, in order.
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

/// Row-wise builder for the wide table.
#[derive(Debug)]
pub struct WideTableBuilder {
    amenity_columns: Vec<String>,
    image_names: Vec<String>,
    image_paths: Vec<String>,
    descriptions: Vec<String>,
    values: Vec<Vec<i64>>,
}

impl WideTableBuilder {
    /// Starts a table with the given amenity columns.
    #[must_use]
    pub fn new(amenity_columns: Vec<String>) -> Self {
        let values = vec![Vec::new(); amenity_columns.len()];
        Self {
            amenity_columns,
            image_names: Vec::new(),
            image_paths: Vec::new(),
            descriptions: Vec::new(),
            values,
        }
    }

    /// Amenity columns, in order.
    #[must_use]
    pub fn amenity_columns(&self) -> &[String] {
        &self.amenity_columns
    }

    /// Adds a row. `values` follow [`amenity_columns`](Self::amenity_columns);
    /// missing trailing values are `0` and extra values are ignored.
    pub fn push_row<I>(&mut self, image_name: &str, image_path: &str, description: &str, values: I)
    where
        I: IntoIterator<Item = i64>,
    {
        self.image_names.push(image_name.to_string());
        self.image_paths.push(image_path.to_string());
        self.descriptions.push(description.to_string());
        let mut values = values.into_iter();
        for column in &mut self.values {
            column.push(values.next().unwrap_or(0));
        }
    }

    /// Number of rows added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    /// Whether no rows were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    /// Assembles the Arrow table.
    pub fn finish(self) -> Result<RecordBatch, QueryError> {
        let schema = wide_schema(&self.amenity_columns);
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(self.image_names)),
            Arc::new(StringArray::from(self.image_paths)),
            Arc::new(StringArray::from(self.descriptions)),
        ];
        columns.extend(
            self.values
                .into_iter()
                .map(|v| Arc::new(Int64Array::from(v)) as ArrayRef),
        );
        Ok(RecordBatch::try_new(schema, columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_shape() {
        let batch = empty_wide_table();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(column_names(&batch), BASE_COLUMNS);
    }

    #[test]
    fn test_builder_pads_short_rows() {
        let mut builder = WideTableBuilder::new(vec!["k1".into(), "k2".into()]);
        builder.push_row("a.jpg", "x/a.jpg", "A", [1]);
        builder.push_row("b.jpg", "x/b.jpg", "B", [0, 1, 1]);
        assert_eq!(builder.len(), 2);
        let batch = builder.finish().unwrap();

        assert_eq!(
            column_names(&batch),
            ["image_name", "image_path", "description", "k1", "k2"]
        );
        let k2 = batch
            .column(4)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(k2.value(0), 0);
        assert_eq!(k2.value(1), 1);
        let paths = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(paths.value(1), "x/b.jpg");
    }

    #[test]
    fn test_summary_serializes() {
        let row = ImageSummary {
            image_path: "a.jpg".into(),
            description: "Cozy".into(),
            amenity_count: 3,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["amenity_count"], 3);
    }
}
