//! Fitted multi-class classifiers.
//!
//! Every classifier reports its probabilities in the order of its own
//! `classes()`; the pipeline maps them onto the category label map.

use arrow::record_batch::RecordBatch;
use heft_core::{ObesityCategory, PredictError, Result, Stage};
use serde::Deserialize;

use crate::frame;

/// A fitted classifier over the selected feature subset.
pub trait Classifier: Send + Sync {
    /// Number of columns the classifier was fit on.
    fn n_features(&self) -> usize;

    /// Column names recorded at fit time, if the artifact kept them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Class ids, in the column order of [`predict_proba`](Self::predict_proba).
    fn classes(&self) -> &[u32];

    /// One probability row per input row.
    fn predict_proba(&self, batch: &RecordBatch) -> Result<Vec<Vec<f64>>>;

    /// One class id per input row: the most probable class.
    fn predict(&self, batch: &RecordBatch) -> Result<Vec<u32>> {
        let classes = self.classes();
        self.predict_proba(batch)?
            .iter()
            .map(|row| {
                argmax(row)
                    .and_then(|i| classes.get(i).copied())
                    .ok_or_else(|| {
                        PredictError::InvalidDistribution("empty probability row".into())
                    })
            })
            .collect()
    }
}

/// Index of the first maximum, skipping NaN.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Multinomial logistic regression: softmax of `coef · x + intercept`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    pub classes: Vec<u32>,
    /// One coefficient row per class.
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl LogisticRegression {
    fn validate(&self) -> Result<(), String> {
        validate_classes(&self.classes)?;
        let k = self.classes.len();
        if self.coef.len() != k || self.intercept.len() != k {
            return Err(format!(
                "expected {k} coefficient rows and intercepts, got {} and {}",
                self.coef.len(),
                self.intercept.len()
            ));
        }
        let n = self.coef[0].len();
        if n == 0 {
            return Err("coefficient rows are empty".into());
        }
        if let Some(i) = self.coef.iter().position(|row| row.len() != n) {
            return Err(format!("coefficient row {i} has {} entries, expected {n}", self.coef[i].len()));
        }
        if self
            .coef
            .iter()
            .flatten()
            .chain(&self.intercept)
            .any(|v| !v.is_finite())
        {
            return Err("coefficients must be finite".into());
        }
        validate_names(self.feature_names.as_deref(), n)
    }

    fn row_proba(&self, x: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(w, b)| w.iter().zip(x).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();
        softmax(&logits)
    }
}

impl Classifier for LogisticRegression {
    fn n_features(&self) -> usize {
        self.coef[0].len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn classes(&self) -> &[u32] {
        &self.classes
    }

    fn predict_proba(&self, batch: &RecordBatch) -> Result<Vec<Vec<f64>>> {
        frame::check_columns(Stage::Classify, batch, self.n_features(), self.feature_names())?;
        Ok(frame::batch_rows(batch)?
            .iter()
            .map(|x| self.row_proba(x))
            .collect())
    }
}

/// One decision tree in flat-array form.
///
/// Node `i` is a leaf when `children_left[i] == -1`; otherwise a sample goes
/// left when `x[feature[i]] <= threshold[i]`. `value[i]` holds per-class
/// weights at node `i`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err("tree arrays differ in length".into());
        }

        // Every node must be reachable from the root exactly once.
        let mut visited = vec![false; n];
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            if std::mem::replace(&mut visited[node], true) {
                return Err(format!("node {node} is reachable twice"));
            }
            if self.value[node].len() != n_classes {
                return Err(format!(
                    "node {node} has {} class weights, expected {n_classes}",
                    self.value[node].len()
                ));
            }
            if self.children_left[node] == -1 {
                continue;
            }
            let child = |c: i64| usize::try_from(c).ok().filter(|&c| c < n);
            let (Some(left), Some(right)) = (
                child(self.children_left[node]),
                child(self.children_right[node]),
            ) else {
                return Err(format!("node {node} has out-of-range children"));
            };
            if usize::try_from(self.feature[node]).map_or(true, |f| f >= n_features) {
                return Err(format!(
                    "node {node} splits on feature {}, model has {n_features}",
                    self.feature[node]
                ));
            }
            if self.threshold[node].is_nan() {
                return Err(format!("node {node} has a NaN threshold"));
            }
            stack.push(left);
            stack.push(right);
        }
        Ok(())
    }

    /// Class weights of the leaf `x` lands in. Assumes a validated tree.
    fn leaf(&self, x: &[f64]) -> &[f64] {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            node = if x[self.feature[node] as usize] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.value[node]
    }
}

/// Random forest: mean of the normalized leaf distributions of its trees.
#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<u32>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl RandomForest {
    fn validate(&self) -> Result<(), String> {
        validate_classes(&self.classes)?;
        if self.n_features == 0 {
            return Err("n_features is 0".into());
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        validate_names(self.feature_names.as_deref(), self.n_features)
    }

    fn row_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(x);
            let total: f64 = leaf.iter().sum();
            if total > 0.0 {
                for (p, w) in proba.iter_mut().zip(leaf) {
                    *p += w / total;
                }
            }
        }
        let n = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n;
        }
        proba
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn classes(&self) -> &[u32] {
        &self.classes
    }

    fn predict_proba(&self, batch: &RecordBatch) -> Result<Vec<Vec<f64>>> {
        frame::check_columns(Stage::Classify, batch, self.n_features(), self.feature_names())?;
        Ok(frame::batch_rows(batch)?
            .iter()
            .map(|x| self.row_proba(x))
            .collect())
    }
}

/// On-disk classifier artifact, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl ClassifierArtifact {
    /// Validate and convert into a shareable classifier.
    pub fn into_classifier(self) -> Result<Box<dyn Classifier>, String> {
        Ok(match self {
            Self::LogisticRegression(m) => {
                m.validate()?;
                Box::new(m)
            }
            Self::RandomForest(m) => {
                m.validate()?;
                Box::new(m)
            }
        })
    }
}

/// Classes must be a permutation of the category label map's ids.
pub fn validate_classes(classes: &[u32]) -> Result<(), String> {
    if classes.len() != ObesityCategory::COUNT {
        return Err(format!(
            "expected {} classes, got {}",
            ObesityCategory::COUNT,
            classes.len()
        ));
    }
    let mut seen = [false; ObesityCategory::COUNT];
    for &c in classes {
        match seen.get_mut(c as usize) {
            None => return Err(format!("unknown class id {c}")),
            Some(true) => return Err(format!("class id {c} listed twice")),
            Some(s) => *s = true,
        }
    }
    Ok(())
}

fn validate_names(names: Option<&[String]>, n_features: usize) -> Result<(), String> {
    match names {
        Some(names) if names.len() != n_features => Err(format!(
            "'feature_names' has {} entries, model has {n_features} features",
            names.len()
        )),
        _ => Ok(()),
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
