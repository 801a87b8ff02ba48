//! Arrow helpers for the row-oriented numeric frames artifacts consume.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use heft_core::{PredictError, Result, Stage};

/// Read one column as `f64`, casting other numeric types.
///
/// Nulls are reported as [`PredictError::InvalidValue`] with a NaN value.
pub fn column_values(batch: &RecordBatch, index: usize) -> Result<Vec<f64>> {
    let col = batch.column(index);
    let cast_col;
    let values = match col.as_any().downcast_ref::<Float64Array>() {
        Some(arr) => arr,
        None => {
            cast_col = cast(col.as_ref(), &DataType::Float64)?;
            cast_col
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| PredictError::Inference("cast to Float64 failed".into()))?
        }
    };

    if values.null_count() > 0 {
        return Err(PredictError::InvalidValue {
            attribute: batch.schema().field(index).name().clone(),
            value: f64::NAN,
        });
    }
    Ok(values.values().to_vec())
}

/// All rows of a batch as dense `f64` vectors, in column order.
pub fn batch_rows(batch: &RecordBatch) -> Result<Vec<Vec<f64>>> {
    let n_rows = batch.num_rows();
    let mut rows = vec![Vec::with_capacity(batch.num_columns()); n_rows];
    for j in 0..batch.num_columns() {
        for (row, v) in rows.iter_mut().zip(column_values(batch, j)?) {
            row.push(v);
        }
    }
    Ok(rows)
}

/// Rebuild a batch with the same column names, applying `f(column, value)`.
pub fn map_columns(batch: &RecordBatch, f: impl Fn(usize, f64) -> f64) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());

    for j in 0..batch.num_columns() {
        let mapped: Float64Array = column_values(batch, j)?
            .into_iter()
            .map(|x| f(j, x))
            .collect::<Vec<_>>()
            .into();
        fields.push(Field::new(schema.field(j).name(), DataType::Float64, false));
        arrays.push(Arc::new(mapped));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Check a batch's width, and its column names when the artifact recorded them.
pub fn check_columns(
    stage: Stage,
    batch: &RecordBatch,
    expected: usize,
    fitted_names: Option<&[String]>,
) -> Result<()> {
    if batch.num_columns() != expected {
        return Err(PredictError::DimensionMismatch {
            stage,
            expected,
            actual: batch.num_columns(),
        });
    }

    if let Some(names) = fitted_names {
        let schema = batch.schema();
        for (position, (field, fitted)) in schema.fields().iter().zip(names).enumerate() {
            if field.name() != fitted {
                return Err(PredictError::ColumnMismatch {
                    stage,
                    position,
                    expected: fitted.clone(),
                    actual: field.name().clone(),
                });
            }
        }
    }
    Ok(())
}

/// Select the named columns, in the order given.
pub fn project<S: AsRef<str>>(batch: &RecordBatch, names: &[S]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = names
        .iter()
        .map(|n| {
            schema
                .index_of(n.as_ref())
                .map_err(|_| PredictError::UnknownAttribute(n.as_ref().to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Float64, false),
            Field::new("b", DataType::Int64, false),
            Field::new("c", DataType::Float64, false),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Int64Array::from(vec![10, 20])),
                Arc::new(Float64Array::from(vec![0.5, 0.25])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rows_cast_integer_columns() {
        let rows = batch_rows(&batch()).unwrap();
        assert_eq!(rows, vec![vec![1.0, 10.0, 0.5], vec![2.0, 20.0, 0.25]]);
    }

    #[test]
    fn nulls_are_invalid() {
        let schema = Schema::new(vec![Field::new("x", DataType::Float64, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Float64Array::from(vec![Some(1.0), None]))],
        )
        .unwrap();
        assert!(matches!(
            batch_rows(&batch),
            Err(PredictError::InvalidValue { ref attribute, .. }) if attribute == "x"
        ));
    }

    #[test]
    fn project_follows_requested_order() {
        let projected = project(&batch(), &["c", "a"]).unwrap();
        assert_eq!(projected.schema().field(0).name(), "c");
        assert_eq!(batch_rows(&projected).unwrap()[0], vec![0.5, 1.0]);
    }

    #[test]
    fn project_unknown_name_fails() {
        let err = project(&batch(), &["a", "zz"]).unwrap_err();
        assert!(matches!(err, PredictError::UnknownAttribute(ref n) if n == "zz"));
    }

    #[test]
    fn map_columns_passes_column_index() {
        let mapped = map_columns(&batch(), |j, x| x * (j as f64 + 1.0)).unwrap();
        assert_eq!(batch_rows(&mapped).unwrap()[1], vec![2.0, 40.0, 0.75]);
        assert_eq!(mapped.schema().field(1).data_type(), &DataType::Float64);
    }

    #[test]
    fn check_columns_reports_width_then_names() {
        let b = batch();
        assert!(matches!(
            check_columns(Stage::Classify, &b, 2, None),
            Err(PredictError::DimensionMismatch { expected: 2, actual: 3, .. })
        ));

        let names = vec!["a".to_string(), "c".to_string(), "b".to_string()];
        match check_columns(Stage::Transform, &b, 3, Some(names.as_slice())).unwrap_err() {
            PredictError::ColumnMismatch {
                position,
                expected,
                actual,
                ..
            } => {
                assert_eq!(position, 1);
                assert_eq!(expected, "c");
                assert_eq!(actual, "b");
            }
            other => panic!("unexpected error: {other}"),
        }

        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(check_columns(Stage::Transform, &b, 3, Some(names.as_slice())).is_ok());
    }
}
