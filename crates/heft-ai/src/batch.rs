//! Scoring many raw records at once from an Arrow batch.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Float64Builder, StringBuilder, UInt64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use heft_core::{ObesityCategory, PredictError, PredictionResult, RawInput, Result};
use tracing::info;

use crate::pipeline::Predictor;

/// Predict every row of `batch` independently.
///
/// Input columns are matched by attribute name and cast to `Float64`; other
/// columns are ignored. A missing column or a null cell leaves that attribute
/// out of the row, which then fails reconciliation on its own without
/// affecting the other rows.
pub fn score_batch(
    predictor: &Predictor,
    batch: &RecordBatch,
) -> Result<Vec<Result<PredictionResult>>> {
    let mut columns: Vec<(&str, Float64Array)> = Vec::new();
    for attr in predictor.schema().inputs() {
        if let Some(col) = batch.column_by_name(&attr.name) {
            let values = cast(col.as_ref(), &DataType::Float64)?;
            let values = values
                .as_any()
                .downcast_ref::<Float64Array>()
                .cloned()
                .ok_or_else(|| PredictError::Inference("cast to Float64 failed".into()))?;
            columns.push((attr.name.as_str(), values));
        }
    }

    let results: Vec<Result<PredictionResult>> = (0..batch.num_rows())
        .map(|row| {
            let raw: RawInput = columns
                .iter()
                .filter(|(_, values)| values.is_valid(row))
                .map(|(name, values)| (*name, values.value(row)))
                .collect();
            predictor.predict_raw(&raw)
        })
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(rows = results.len(), failed, "scored batch");
    Ok(results)
}

/// Output schema: row index, category or error, then one probability column
/// per category in label-map order.
pub fn results_schema() -> Schema {
    let mut fields = vec![
        Field::new("row", DataType::UInt64, false),
        Field::new("category", DataType::Utf8, true),
        Field::new("error", DataType::Utf8, true),
    ];
    fields.extend(
        ObesityCategory::ALL
            .iter()
            .map(|c| Field::new(c.as_str(), DataType::Float64, true)),
    );
    Schema::new(fields)
}

pub fn results_to_batch(results: &[Result<PredictionResult>]) -> Result<RecordBatch> {
    let rows = UInt64Array::from_iter_values(0..results.len() as u64);
    let mut category = StringBuilder::new();
    let mut error = StringBuilder::new();
    let mut probs: Vec<Float64Builder> = (0..ObesityCategory::COUNT)
        .map(|_| Float64Builder::with_capacity(results.len()))
        .collect();

    for result in results {
        match result {
            Ok(r) => {
                category.append_value(r.category.as_str());
                error.append_null();
                for (builder, &p) in probs.iter_mut().zip(&r.probabilities) {
                    builder.append_value(p);
                }
            }
            Err(e) => {
                category.append_null();
                error.append_value(e.to_string());
                for builder in &mut probs {
                    builder.append_null();
                }
            }
        }
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(rows),
        Arc::new(category.finish()),
        Arc::new(error.finish()),
    ];
    columns.extend(probs.iter_mut().map(|b| Arc::new(b.finish()) as ArrayRef));

    Ok(RecordBatch::try_new(Arc::new(results_schema()), columns)?)
}
