use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, StringArray,
};
use arrow::compute::{concat_batches, filter_record_batch, sort_to_indices, take, SortOptions};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{CorpusError, Result};

/// An immutable in-memory table: a single `RecordBatch` with typed
/// column accessors and vectorized filter/sort. This is the engine's
/// "DataFrame"; non-matching rows are never materialized row-by-row.
#[derive(Debug, Clone)]
pub struct Frame {
    batch: RecordBatch,
}

impl Frame {
    pub fn new(batch: RecordBatch) -> Self {
        Frame { batch }
    }

    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        let batch = concat_batches(&schema, batches)?;
        Ok(Frame { batch })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| CorpusError::DatasetAccess(format!("missing column '{name}'")))
    }

    pub fn str_col(&self, name: &str) -> Result<&StringArray> {
        self.column(name)?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| CorpusError::DatasetAccess(format!("column '{name}' is not utf8")))
    }

    pub fn f64_col(&self, name: &str) -> Result<&Float64Array> {
        self.column(name)?
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| CorpusError::DatasetAccess(format!("column '{name}' is not f64")))
    }

    pub fn i64_col(&self, name: &str) -> Result<&Int64Array> {
        self.column(name)?
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| CorpusError::DatasetAccess(format!("column '{name}' is not i64")))
    }

    pub fn list_col(&self, name: &str) -> Result<&ListArray> {
        self.column(name)?
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| CorpusError::DatasetAccess(format!("column '{name}' is not a list")))
    }

    /// String cell, empty when null.
    pub fn str_value(&self, name: &str, row: usize) -> Result<String> {
        let col = self.str_col(name)?;
        if col.is_null(row) {
            Ok(String::new())
        } else {
            Ok(col.value(row).to_string())
        }
    }

    /// String cell, `None` when null or empty.
    pub fn opt_str_value(&self, name: &str, row: usize) -> Result<Option<String>> {
        let v = self.str_value(name, row)?;
        Ok(if v.is_empty() { None } else { Some(v) })
    }

    /// Float cell, 0.0 when null.
    pub fn f64_value(&self, name: &str, row: usize) -> Result<f64> {
        let col = self.f64_col(name)?;
        Ok(if col.is_null(row) { 0.0 } else { col.value(row) })
    }

    /// Float cell preserving nulls.
    pub fn opt_f64_value(&self, name: &str, row: usize) -> Result<Option<f64>> {
        let col = self.f64_col(name)?;
        Ok(if col.is_null(row) {
            None
        } else {
            Some(col.value(row))
        })
    }

    /// Integer cell, 0 when null.
    pub fn i64_value(&self, name: &str, row: usize) -> Result<i64> {
        let col = self.i64_col(name)?;
        Ok(if col.is_null(row) { 0 } else { col.value(row) })
    }

    /// String-list cell, empty when null.
    pub fn list_value(&self, name: &str, row: usize) -> Result<Vec<String>> {
        let col = self.list_col(name)?;
        if col.is_null(row) {
            return Ok(Vec::new());
        }
        let values = col.value(row);
        let strings = values
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                CorpusError::DatasetAccess(format!("column '{name}' is not a list of utf8"))
            })?;
        Ok((0..strings.len())
            .filter(|&i| !strings.is_null(i))
            .map(|i| strings.value(i).to_string())
            .collect())
    }

    /// Keep only rows where `mask` is true.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Frame> {
        Ok(Frame::new(filter_record_batch(&self.batch, mask)?))
    }

    /// Stable sort on a single column.
    pub fn sort_by(&self, name: &str, descending: bool) -> Result<Frame> {
        let col = self.column(name)?;
        let options = SortOptions {
            descending,
            nulls_first: !descending,
        };
        let indices = sort_to_indices(col, Some(options), None)?;
        let columns = self
            .batch
            .columns()
            .iter()
            .map(|c| take(c, &indices, None))
            .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
        Ok(Frame::new(RecordBatch::try_new(
            self.batch.schema(),
            columns,
        )?))
    }

    /// First `n` rows (zero-copy slice).
    pub fn head(&self, n: usize) -> Frame {
        let n = n.min(self.batch.num_rows());
        Frame::new(self.batch.slice(0, n))
    }
}

/// Build an equality mask for a string column against a scalar.
pub(crate) fn str_eq_mask(frame: &Frame, name: &str, value: &str) -> Result<BooleanArray> {
    let col = frame.str_col(name)?;
    let scalar = StringArray::new_scalar(value);
    Ok(arrow::compute::kernels::cmp::eq(col, &scalar)?)
}

pub(crate) fn f64_ge_mask(frame: &Frame, name: &str, value: f64) -> Result<BooleanArray> {
    let col = frame.f64_col(name)?;
    let scalar = Float64Array::new_scalar(value);
    Ok(arrow::compute::kernels::cmp::gt_eq(col, &scalar)?)
}

pub(crate) fn f64_le_mask(frame: &Frame, name: &str, value: f64) -> Result<BooleanArray> {
    let col = frame.f64_col(name)?;
    let scalar = Float64Array::new_scalar(value);
    Ok(arrow::compute::kernels::cmp::lt_eq(col, &scalar)?)
}

pub(crate) fn i64_ge_mask(frame: &Frame, name: &str, value: i64) -> Result<BooleanArray> {
    let col = frame.i64_col(name)?;
    let scalar = Int64Array::new_scalar(value);
    Ok(arrow::compute::kernels::cmp::gt_eq(col, &scalar)?)
}

pub(crate) fn i64_le_mask(frame: &Frame, name: &str, value: i64) -> Result<BooleanArray> {
    let col = frame.i64_col(name)?;
    let scalar = Int64Array::new_scalar(value);
    Ok(arrow::compute::kernels::cmp::lt_eq(col, &scalar)?)
}

/// Combine two masks conjunctively.
pub(crate) fn and_mask(a: &BooleanArray, b: &BooleanArray) -> Result<BooleanArray> {
    Ok(arrow::compute::kernels::boolean::and(a, b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample() -> Frame {
        let batch = RecordBatch::try_from_iter(vec![
            (
                "episode_id",
                Arc::new(StringArray::from(vec!["e1", "e2", "e3"])) as ArrayRef,
            ),
            (
                "duration_seconds",
                Arc::new(Float64Array::from(vec![60.0, 120.0, 30.0])) as ArrayRef,
            ),
        ])
        .unwrap();
        Frame::new(batch)
    }

    #[test]
    fn filter_by_string_equality() {
        let f = sample();
        let mask = str_eq_mask(&f, "episode_id", "e2").unwrap();
        let out = f.filter(&mask).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.str_value("episode_id", 0).unwrap(), "e2");
    }

    #[test]
    fn range_masks_are_inclusive() {
        let f = sample();
        let ge = f64_ge_mask(&f, "duration_seconds", 60.0).unwrap();
        let le = f64_le_mask(&f, "duration_seconds", 60.0).unwrap();
        let both = and_mask(&ge, &le).unwrap();
        let out = f.filter(&both).unwrap();
        // max == min keeps the exact match.
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.f64_value("duration_seconds", 0).unwrap(), 60.0);
    }

    #[test]
    fn sort_ascending_by_float() {
        let f = sample().sort_by("duration_seconds", false).unwrap();
        assert_eq!(f.str_value("episode_id", 0).unwrap(), "e3");
        assert_eq!(f.str_value("episode_id", 2).unwrap(), "e2");
    }

    #[test]
    fn head_limits_rows() {
        let f = sample();
        assert_eq!(f.head(2).num_rows(), 2);
        assert_eq!(f.head(10).num_rows(), 3);
    }
}
