//! Per-request records: the caller's partial input and the reconciled full row.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Caller-supplied attribute values keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInput {
    values: BTreeMap<String, f64>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: f64) -> Option<f64> {
        self.values.insert(name.to_string(), value)
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for RawInput {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The eight attributes collected from a person, with their training-set names.
///
/// Defaults are the starting values of the `heft predict` flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObesityInput {
    /// Body weight in kilograms.
    #[serde(rename = "Weight")]
    pub weight: f64,
    /// Height in metres.
    #[serde(rename = "Height")]
    pub height: f64,
    /// Vegetable consumption frequency: 1 rarely, 2 sometimes, 3 always.
    #[serde(rename = "FCVC")]
    pub fcvc: f64,
    /// Age in years.
    #[serde(rename = "Age")]
    pub age: f64,
    /// 1 male, 0 female.
    #[serde(rename = "Gender")]
    pub gender: f64,
    /// Daily device use: 0 for 0-2h, 1 for 3-5h, 2 for more than 5h.
    #[serde(rename = "TUE")]
    pub tue: f64,
    /// Daily water: 1 under 1L, 2 for 1-2L, 3 over 2L.
    #[serde(rename = "CH2O")]
    pub ch2o: f64,
    /// Physical activity: 0 never, 1 for 1-2 days/week, 2 for 2-4, 3 for 4-5.
    #[serde(rename = "FAF")]
    pub faf: f64,
}

impl Default for ObesityInput {
    fn default() -> Self {
        Self {
            weight: 70.0,
            height: 1.70,
            fcvc: 2.0,
            age: 25.0,
            gender: 1.0,
            tue: 1.0,
            ch2o: 2.0,
            faf: 1.0,
        }
    }
}

impl From<ObesityInput> for RawInput {
    fn from(input: ObesityInput) -> Self {
        RawInput::from_iter([
            ("Weight", input.weight),
            ("Height", input.height),
            ("FCVC", input.fcvc),
            ("Age", input.age),
            ("Gender", input.gender),
            ("TUE", input.tue),
            ("CH2O", input.ch2o),
            ("FAF", input.faf),
        ])
    }
}

/// A complete row in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FullRecord {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl FullRecord {
    pub(crate) fn new(columns: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(|c| c.as_str())
            .zip(self.values.iter().copied())
    }

    /// Single-row batch with one non-nullable `Float64` column per attribute.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c, DataType::Float64, false))
            .collect();
        let arrays: Vec<ArrayRef> = self
            .values
            .iter()
            .map(|&v| Arc::new(Float64Array::from(vec![v])) as ArrayRef)
            .collect();
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obesity_input_converts_to_eight_named_values() {
        let raw = RawInput::from(ObesityInput::default());
        assert_eq!(raw.len(), 8);
        assert_eq!(raw.get("Weight"), Some(70.0));
        assert_eq!(raw.get("Height"), Some(1.70));
        assert_eq!(raw.get("Gender"), Some(1.0));
    }

    #[test]
    fn obesity_input_uses_training_names_in_json() {
        let json = r#"{"Weight":82.5,"Height":1.8,"FCVC":3,"Age":40,
                       "Gender":0,"TUE":2,"CH2O":1,"FAF":0}"#;
        let input: ObesityInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.weight, 82.5);
        assert_eq!(input.fcvc, 3.0);
        assert_eq!(input.gender, 0.0);
    }

    #[test]
    fn raw_input_roundtrips_as_plain_map() {
        let raw = RawInput::new().with("Weight", 70.0).with("Age", 25.0);
        let json = serde_json::to_string(&raw).unwrap();
        assert_eq!(json, r#"{"Age":25.0,"Weight":70.0}"#);
    }

    #[test]
    fn full_record_to_batch_is_single_row() {
        let record = FullRecord::new(vec!["a".into(), "b".into()], vec![1.5, -2.0]);
        let batch = record.to_batch().unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.schema().field(1).name(), "b");
        let col = batch
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(col.value(0), -2.0);
    }
}
