//! Flat observations and the Arrow table they are collected into.

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Column holding the observation's time period.
pub const TIME_PERIOD: &str = "TIME_PERIOD";

/// Column holding the observation's value.
pub const OBS_VALUE: &str = "OBS_VALUE";

/// One decoded observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Dimension column to value, in dimension order.
    pub dimensions: IndexMap<String, String>,
    /// Raw time period code, e.g. `2020` or `2020-Q1`.
    pub time_period: String,
    /// `None` for missing or non-numeric values.
    pub value: Option<f64>,
    /// Attribute column to value; absent attributes have no entry.
    pub attributes: IndexMap<String, String>,
}

impl Record {
    /// Looks a column up the same way [`Table`] lays columns out.
    pub fn get(&self, column: &str) -> Option<String> {
        match column {
            TIME_PERIOD => Some(self.time_period.clone()),
            OBS_VALUE => self.value.map(|v| v.to_string()),
            _ => self
                .dimensions
                .get(column)
                .or_else(|| self.attributes.get(column))
                .cloned(),
        }
    }
}

/// Decoded records as one Arrow [`RecordBatch`].
///
/// Columns are dimension columns in first-seen order, then [`TIME_PERIOD`]
/// and [`OBS_VALUE`], then attribute columns in first-seen order. Everything
/// but `OBS_VALUE` (nullable `Float64`) is `Utf8`; a record without a given
/// dimension or attribute has a null cell there.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    pub fn from_records(records: &[Record]) -> Result<Self> {
        let mut dims: IndexSet<&str> = IndexSet::new();
        let mut attrs: IndexSet<&str> = IndexSet::new();
        for r in records {
            dims.extend(r.dimensions.keys().map(String::as_str));
            attrs.extend(r.attributes.keys().map(String::as_str));
        }

        if let Some(name) = dims
            .iter()
            .chain(&attrs)
            .find(|name| [TIME_PERIOD, OBS_VALUE].contains(*name))
            .or_else(|| attrs.iter().find(|name| dims.contains(*name)))
        {
            return Err(Error::decode(format!("column '{name}' is produced twice")));
        }

        let mut fields: Vec<Field> = Vec::with_capacity(dims.len() + attrs.len() + 2);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

        for name in &dims {
            fields.push(Field::new(*name, DataType::Utf8, true));
            let arr: StringArray = records.iter().map(|r| r.dimensions.get(*name)).collect();
            columns.push(Arc::new(arr));
        }

        fields.push(Field::new(TIME_PERIOD, DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.time_period.as_str()),
        )));
        fields.push(Field::new(OBS_VALUE, DataType::Float64, true));
        columns.push(Arc::new(records.iter().map(|r| r.value).collect::<Float64Array>()));

        for name in &attrs {
            fields.push(Field::new(*name, DataType::Utf8, true));
            let arr: StringArray = records.iter().map(|r| r.attributes.get(*name)).collect();
            columns.push(Arc::new(arr));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(Self { batch })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn columns(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// The observation values, null where the value is missing.
    pub fn values(&self) -> Option<&Float64Array> {
        self.batch
            .column_by_name(OBS_VALUE)
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
    }

    /// One cell rendered as text; `None` for null cells, unknown columns and
    /// rows past the end.
    pub fn cell(&self, row: usize, column: &str) -> Option<String> {
        let array = self.batch.column_by_name(column)?;
        if row >= array.len() || array.is_null(row) {
            return None;
        }
        if let Some(values) = array.as_any().downcast_ref::<Float64Array>() {
            return Some(values.value(row).to_string());
        }
        array
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| s.value(row).to_string())
    }

    /// All values of one column, `None` where a row has no value.
    pub fn column(&self, column: &str) -> Vec<Option<String>> {
        (0..self.len()).map(|row| self.cell(row, column)).collect()
    }

    /// Renders the first `n` rows as a text grid.
    pub fn head(&self, n: usize) -> Head<'_> {
        Head { table: self, n }
    }
}

/// Text rendering of the first rows of a [`Table`].
pub struct Head<'a> {
    table: &'a Table,
    n: usize,
}

impl fmt::Display for Head<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.table.len();
        let rows = self.table.batch.slice(0, self.n.min(total));
        let grid = pretty_format_batches(&[rows]).map_err(|_| fmt::Error)?;
        writeln!(f, "{grid}")?;
        if total > self.n {
            writeln!(f, "[{} rows x {} columns]", total, self.table.batch.num_columns())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(area: &str, period: &str, value: Option<f64>, note: Option<&str>) -> Record {
        let mut dimensions = IndexMap::new();
        dimensions.insert("REF_AREA".to_string(), area.to_string());
        let mut attributes = IndexMap::new();
        if let Some(n) = note {
            attributes.insert("OBS_FOOTNOTE".to_string(), n.to_string());
        }
        Record {
            dimensions,
            time_period: period.to_string(),
            value,
            attributes,
        }
    }

    #[test]
    fn columns_are_dimensions_then_time_value_then_attributes() {
        let table = Table::from_records(&[
            record("CZE", "2019", Some(3.1), None),
            record("DZA", "2019", Some(23.0), Some("estimate")),
        ])
        .unwrap();
        assert_eq!(
            table.columns(),
            ["REF_AREA", "TIME_PERIOD", "OBS_VALUE", "OBS_FOOTNOTE"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "OBS_FOOTNOTE").as_deref(), Some("estimate"));
        assert_eq!(table.cell(0, "OBS_FOOTNOTE"), None);
        assert_eq!(table.cell(0, "OBS_VALUE").as_deref(), Some("3.1"));
        assert_eq!(table.cell(5, "REF_AREA"), None);
        assert_eq!(table.cell(0, "UNKNOWN"), None);
    }

    #[test]
    fn schema_types_and_nullability() {
        let table = Table::from_records(&[
            record("CZE", "2019", Some(3.1), None),
            record("CZE", "2020", None, Some("missing")),
        ])
        .unwrap();
        let schema = table.batch().schema();
        let field = |name: &str| schema.field_with_name(name).unwrap().clone();

        assert_eq!(field("REF_AREA").data_type(), &DataType::Utf8);
        assert_eq!(field("OBS_FOOTNOTE").data_type(), &DataType::Utf8);
        assert!(field("OBS_FOOTNOTE").is_nullable());
        assert_eq!(field(TIME_PERIOD).data_type(), &DataType::Utf8);
        assert!(!field(TIME_PERIOD).is_nullable());
        assert_eq!(field(OBS_VALUE).data_type(), &DataType::Float64);
        assert!(field(OBS_VALUE).is_nullable());

        let values = table.values().unwrap();
        assert_eq!(values.value(0), 3.1);
        assert!(values.is_null(1));
        assert_eq!(table.batch().column(3).null_count(), 1);
    }

    #[test]
    fn column_extraction_keeps_row_order() {
        let table = Table::from_records(&[
            record("CZE", "2019", Some(3.1), None),
            record("CZE", "2020", None, None),
        ])
        .unwrap();
        assert_eq!(
            table.column(TIME_PERIOD),
            [Some("2019".to_string()), Some("2020".to_string())]
        );
        assert_eq!(table.column(OBS_VALUE), [Some("3.1".to_string()), None]);
    }

    #[test]
    fn head_renders_first_rows() {
        let table = Table::from_records(&[
            record("CZE", "2019", Some(3.1), None),
            record("DZA", "2019", Some(23.5), None),
            record("DZA", "2020", Some(22.5), None),
        ])
        .unwrap();
        let text = table.head(2).to_string();
        assert!(text.contains("| REF_AREA | TIME_PERIOD | OBS_VALUE |"), "{text}");
        assert!(text.contains("CZE"), "{text}");
        assert!(text.contains("23.5"), "{text}");
        assert!(!text.contains("22.5"), "{text}");
        assert_eq!(text.lines().last(), Some("[3 rows x 3 columns]"));

        let full = table.head(10).to_string();
        assert!(full.contains("22.5"));
        assert!(!full.contains("rows x"));
    }

    #[test]
    fn empty_table_still_has_value_columns() {
        let table = Table::from_records(&[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), [TIME_PERIOD, OBS_VALUE]);
        assert!(table.head(5).to_string().contains("TIME_PERIOD"));
    }

    #[test]
    fn attribute_named_like_a_dimension_is_rejected() {
        let mut r = record("CZE", "2019", Some(3.1), None);
        r.attributes.insert("REF_AREA".to_string(), "x".to_string());
        let err = Table::from_records(&[r]).unwrap_err();
        assert!(err.to_string().contains("'REF_AREA'"), "{err}");

        let mut r = record("CZE", "2019", Some(3.1), None);
        r.dimensions.insert(OBS_VALUE.to_string(), "x".to_string());
        assert!(matches!(Table::from_records(&[r]), Err(Error::Decode { .. })));
    }
}
