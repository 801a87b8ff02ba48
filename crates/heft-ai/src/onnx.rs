//! ONNX Runtime classifier for models exported with `skl2onnx`.
//!
//! The model must take a single `float32` tensor of shape `[N, k]` and expose
//! `output_label` (`int64`, `[N]`) and `output_probability` (`float32`,
//! `[N, 7]`). Export with `zipmap=False` so probabilities come out as a tensor
//! rather than a sequence of maps.

use std::path::Path;
use std::sync::Mutex;

use arrow::record_batch::RecordBatch;
use heft_core::{ObesityCategory, PredictError, Result};
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use crate::classifier::Classifier;
use crate::frame;

const LABEL_OUTPUT: &str = "output_label";
const PROBABILITY_OUTPUT: &str = "output_probability";

pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    n_features: usize,
    classes: Vec<u32>,
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PredictError::artifact_load(path, "file not found"));
        }
        let session = Session::builder()
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| PredictError::artifact_load(path, e))?;

        let input = session
            .inputs()
            .first()
            .ok_or_else(|| PredictError::artifact_load(path, "model has no inputs"))?;
        let input_name = input.name().to_string();
        let n_features = infer_width(input.dtype())
            .ok_or_else(|| PredictError::artifact_load(path, "input width is not fixed"))?;

        for name in [LABEL_OUTPUT, PROBABILITY_OUTPUT] {
            if !session.outputs().iter().any(|o| o.name() == name) {
                return Err(PredictError::artifact_load(
                    path,
                    format!("model has no `{name}` output"),
                ));
            }
        }

        info!(model = %path.display(), input = %input_name, n_features, "loaded onnx classifier");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            n_features,
            classes: ObesityCategory::ALL.iter().map(|c| c.class_id()).collect(),
        })
    }

    fn run(&self, batch: &RecordBatch) -> Result<(Vec<i64>, Vec<Vec<f64>>)> {
        let rows = frame::batch_rows(batch)?;
        let n = rows.len();
        let flat: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
        let shape = [n as i64, self.n_features as i64];
        let tensor = Tensor::from_array((shape, flat.into_boxed_slice())).map_err(inference)?;

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(inference)?;

        let (_, labels) = outputs[LABEL_OUTPUT]
            .try_extract_tensor::<i64>()
            .map_err(inference)?;
        let (shape, proba) = outputs[PROBABILITY_OUTPUT]
            .try_extract_tensor::<f32>()
            .map_err(inference)?;
        let width = check_output_shape(shape, n)?;
        if labels.len() != n {
            return Err(PredictError::Inference(format!(
                "model returned {} labels for {n} rows",
                labels.len()
            )));
        }

        Ok((labels.to_vec(), probability_rows(proba, width)))
    }
}

impl Classifier for OnnxClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[u32] {
        &self.classes
    }

    fn predict_proba(&self, batch: &RecordBatch) -> Result<Vec<Vec<f64>>> {
        self.run(batch).map(|(_, proba)| proba)
    }

    /// The model's own label output, so the pipeline can check it against
    /// the probability argmax.
    fn predict(&self, batch: &RecordBatch) -> Result<Vec<u32>> {
        let (labels, _) = self.run(batch)?;
        labels
            .into_iter()
            .map(|l| {
                u32::try_from(l).map_err(|_| PredictError::Inference(format!("negative label {l}")))
            })
            .collect()
    }
}

/// Split a row-major `[N, width]` buffer. `width` must be non-zero.
fn probability_rows(flat: &[f32], width: usize) -> Vec<Vec<f64>> {
    flat.chunks(width)
        .map(|row| row.iter().map(|&p| f64::from(p)).collect())
        .collect()
}

/// Width of a `[n, width]` probability output; zero width is rejected.
fn check_output_shape(dims: &[i64], n: usize) -> Result<usize> {
    match dims {
        &[rows, width] if rows >= 0 && rows as usize == n && width > 0 => Ok(width as usize),
        _ => Err(PredictError::Inference(format!(
            "unexpected output shape {dims:?} for {n} rows"
        ))),
    }
}

fn inference(e: ort::Error) -> PredictError {
    PredictError::Inference(e.to_string())
}

/// Last dimension of a fixed-width tensor input.
fn infer_width(input_type: &ort::value::ValueType) -> Option<usize> {
    match input_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn model_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("obesity_model.onnx")
    }

    #[test]
    fn missing_model_is_artifact_load_error() {
        let err = OnnxClassifier::load(Path::new("/nonexistent/model.onnx"))
            .err()
            .unwrap();
        assert!(matches!(err, PredictError::ArtifactLoad { .. }));
    }

    #[test]
    fn zero_width_output_is_rejected() {
        assert!(matches!(
            check_output_shape(&[1, 0], 1),
            Err(PredictError::Inference(_))
        ));
        assert!(check_output_shape(&[2, 7], 1).is_err());
        assert!(check_output_shape(&[1], 1).is_err());
        assert_eq!(check_output_shape(&[2, 7], 2).unwrap(), 7);
    }

    #[test]
    fn probability_rows_split_row_major() {
        let rows = probability_rows(&[0.25, 0.75, 1.0, 0.0], 2);
        assert_eq!(rows, vec![vec![0.25, 0.75], vec![1.0, 0.0]]);
    }

    #[test]
    #[ignore] // requires models/obesity_model.onnx
    fn exported_model_reports_seven_classes() {
        let clf = OnnxClassifier::load(&model_path()).unwrap();
        assert_eq!(clf.n_features(), 8);
        assert_eq!(clf.classes().len(), 7);
    }
}
