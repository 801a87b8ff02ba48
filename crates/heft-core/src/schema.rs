//! Declarative attribute schema for the obesity model.
//!
//! One table of [`Attribute`] descriptors is the single source of truth for
//! the three views the pipeline needs:
//!
//! - the full column order the transformer was fit on ([`FeatureSchema::names`])
//! - the defaults filled in for attributes the caller does not supply
//!   ([`FeatureSchema::defaults`])
//! - the ordered subset the classifier was fit on ([`FeatureSchema::selected`])

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use arrow::datatypes::{DataType, Field, Schema};
use serde::Serialize;

use crate::error::{PredictError, Result};
use crate::reconcile::reconcile;
use crate::record::{FullRecord, RawInput};

/// How a caller-supplied attribute is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Continuous,
    Integer,
    Ordinal,
    Binary,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Integer => "integer",
            Self::Ordinal => "ordinal",
            Self::Binary => "binary",
        }
    }

    /// Integer, ordinal and binary values must be whole numbers.
    pub fn is_discrete(&self) -> bool {
        !matches!(self, Self::Continuous)
    }
}

/// Where an attribute's value comes from at prediction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSource {
    /// Supplied by the caller, accepted within `min..=max`.
    Input { kind: ValueKind, min: f64, max: f64 },
    /// Fixed default derived from training-set statistics.
    Default(f64),
}

/// One column of the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub source: AttributeSource,
    /// Position in the classifier's feature subset, if it consumes this column.
    pub selected: Option<usize>,
}

impl Attribute {
    pub fn input(name: &str, kind: ValueKind, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            source: AttributeSource::Input { kind, min, max },
            selected: None,
        }
    }

    pub fn fixed(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            source: AttributeSource::Default(value),
            selected: None,
        }
    }

    pub fn selected_at(mut self, position: usize) -> Self {
        self.selected = Some(position);
        self
    }

    pub fn default_value(&self) -> Option<f64> {
        match self.source {
            AttributeSource::Default(v) => Some(v),
            AttributeSource::Input { .. } => None,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self.source, AttributeSource::Input { .. })
    }
}

/// The obesity model's 16 attributes, in the order the scaler was fit on.
pub fn obesity_attributes() -> Vec<Attribute> {
    use ValueKind::*;

    vec![
        Attribute::input("Age", Integer, 14.0, 110.0).selected_at(3),
        Attribute::input("Gender", Binary, 0.0, 1.0).selected_at(4),
        Attribute::input("Height", Continuous, 1.0, 2.5).selected_at(1),
        Attribute::input("Weight", Continuous, 30.0, 200.0).selected_at(0),
        Attribute::fixed("CALC", 1.0 / 3.0),
        Attribute::fixed("FAVC", 1.0),
        Attribute::input("FCVC", Ordinal, 1.0, 3.0).selected_at(2),
        Attribute::fixed("NCP", 0.625),
        Attribute::fixed("SCC", 0.0),
        Attribute::fixed("SMOKE", 0.0),
        Attribute::input("CH2O", Ordinal, 1.0, 3.0).selected_at(6),
        Attribute::fixed("family_history_with_overweight", 1.0),
        Attribute::input("FAF", Ordinal, 0.0, 3.0).selected_at(7),
        Attribute::input("TUE", Ordinal, 0.0, 2.0).selected_at(5),
        Attribute::fixed("CAEC", 1.0 / 3.0),
        Attribute::fixed("MTRANS", 0.75),
    ]
}

static OBESITY: LazyLock<FeatureSchema> =
    LazyLock::new(|| FeatureSchema::derive(obesity_attributes()));

/// Attribute schema with its derived views precomputed.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    attributes: Vec<Attribute>,
    names: Vec<String>,
    defaults: BTreeMap<String, f64>,
    selected: Vec<String>,
}

impl FeatureSchema {
    /// Validate a descriptor table and derive its views.
    ///
    /// Names must be unique, defaults finite, and selected positions must
    /// form `0..k` without gaps or repeats.
    pub fn new(attributes: Vec<Attribute>) -> Result<Self> {
        if attributes.is_empty() {
            return Err(PredictError::InvalidSchema("no attributes".into()));
        }

        let mut seen = HashSet::new();
        for attr in &attributes {
            if !seen.insert(attr.name.as_str()) {
                return Err(PredictError::InvalidSchema(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
            match attr.source {
                AttributeSource::Default(v) if !v.is_finite() => {
                    return Err(PredictError::InvalidSchema(format!(
                        "default for '{}' is not finite",
                        attr.name
                    )));
                }
                AttributeSource::Input { min, max, .. } if !(min <= max) => {
                    return Err(PredictError::InvalidSchema(format!(
                        "range for '{}' is empty ({min}..={max})",
                        attr.name
                    )));
                }
                _ => {}
            }
        }

        let mut positions: Vec<usize> = attributes.iter().filter_map(|a| a.selected).collect();
        positions.sort_unstable();
        if positions.is_empty() {
            return Err(PredictError::InvalidSchema("no selected attributes".into()));
        }
        if positions.iter().enumerate().any(|(i, &p)| i != p) {
            return Err(PredictError::InvalidSchema(format!(
                "selected positions {positions:?} are not 0..{}",
                positions.len()
            )));
        }

        Ok(Self::derive(attributes))
    }

    /// The built-in obesity schema.
    pub fn obesity() -> &'static FeatureSchema {
        &OBESITY
    }

    fn derive(attributes: Vec<Attribute>) -> Self {
        let names = attributes.iter().map(|a| a.name.clone()).collect();

        let defaults = attributes
            .iter()
            .filter_map(|a| a.default_value().map(|v| (a.name.clone(), v)))
            .collect();

        let mut ranked: Vec<(usize, &str)> = attributes
            .iter()
            .filter_map(|a| a.selected.map(|p| (p, a.name.as_str())))
            .collect();
        ranked.sort_unstable_by_key(|&(p, _)| p);
        let selected = ranked.into_iter().map(|(_, n)| n.to_string()).collect();

        Self {
            attributes,
            names,
            defaults,
            selected,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Full column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Default value table for attributes the caller does not supply.
    pub fn defaults(&self) -> &BTreeMap<String, f64> {
        &self.defaults
    }

    /// Classifier feature subset, in the classifier's column order.
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Names the caller must supply, in schema order.
    pub fn inputs(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.is_input())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Arrow schema for a full record: one non-nullable `Float64` per attribute.
    pub fn arrow_schema(&self) -> Schema {
        Schema::new(
            self.names
                .iter()
                .map(|n| Field::new(n, DataType::Float64, false))
                .collect::<Vec<_>>(),
        )
    }

    /// Check every supplied value against its attribute's accepted range
    /// and, for integer, ordinal and binary attributes, that it is whole.
    ///
    /// Names that are not inputs of this schema are left for
    /// [`reconcile`](Self::reconcile) to report.
    pub fn validate_ranges(&self, raw: &RawInput) -> Result<()> {
        for (name, value) in raw.iter() {
            let Some(Attribute {
                source: AttributeSource::Input { kind, min, max },
                ..
            }) = self.attribute(name)
            else {
                continue;
            };
            if !(*min..=*max).contains(&value) {
                return Err(PredictError::OutOfRange {
                    attribute: name.to_string(),
                    value,
                    min: *min,
                    max: *max,
                });
            }
            if kind.is_discrete() && value.fract() != 0.0 {
                return Err(PredictError::InvalidKind {
                    attribute: name.to_string(),
                    value,
                    kind: kind.as_str(),
                });
            }
        }
        Ok(())
    }

    /// Complete `raw` with this schema's defaults, in schema order.
    pub fn reconcile(&self, raw: &RawInput) -> Result<FullRecord> {
        reconcile(raw, self.names.as_slice(), &self.defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_is_valid() {
        assert!(FeatureSchema::new(obesity_attributes()).is_ok());
    }

    #[test]
    fn builtin_full_order() {
        let schema = FeatureSchema::obesity();
        assert_eq!(
            schema.names(),
            [
                "Age",
                "Gender",
                "Height",
                "Weight",
                "CALC",
                "FAVC",
                "FCVC",
                "NCP",
                "SCC",
                "SMOKE",
                "CH2O",
                "family_history_with_overweight",
                "FAF",
                "TUE",
                "CAEC",
                "MTRANS",
            ]
        );
    }

    #[test]
    fn builtin_selected_order() {
        let schema = FeatureSchema::obesity();
        assert_eq!(
            schema.selected(),
            ["Weight", "Height", "FCVC", "Age", "Gender", "TUE", "CH2O", "FAF"]
        );
    }

    #[test]
    fn builtin_defaults() {
        let defaults = FeatureSchema::obesity().defaults();
        assert_eq!(defaults.len(), 8);
        assert!((defaults["CALC"] - 0.3333333333333333).abs() < 1e-12);
        assert!((defaults["CAEC"] - 0.3333333333333333).abs() < 1e-12);
        assert_eq!(defaults["FAVC"], 1.0);
        assert_eq!(defaults["NCP"], 0.625);
        assert_eq!(defaults["SCC"], 0.0);
        assert_eq!(defaults["SMOKE"], 0.0);
        assert_eq!(defaults["family_history_with_overweight"], 1.0);
        assert_eq!(defaults["MTRANS"], 0.75);
    }

    #[test]
    fn inputs_and_defaults_partition_schema() {
        let schema = FeatureSchema::obesity();
        let inputs: HashSet<&str> = schema.inputs().map(|a| a.name.as_str()).collect();
        let defaults: HashSet<&str> = schema.defaults().keys().map(|s| s.as_str()).collect();
        assert_eq!(inputs.len(), 8);
        assert!(inputs.is_disjoint(&defaults));
        assert_eq!(inputs.len() + defaults.len(), schema.len());
    }

    #[test]
    fn selected_is_subset_of_inputs() {
        let schema = FeatureSchema::obesity();
        for name in schema.selected() {
            assert!(schema.attribute(name).unwrap().is_input(), "{name}");
        }
    }

    #[test]
    fn arrow_schema_matches_names() {
        let schema = FeatureSchema::obesity();
        let arrow = schema.arrow_schema();
        assert_eq!(arrow.fields().len(), 16);
        assert_eq!(arrow.field(3).name(), "Weight");
        assert_eq!(arrow.field(3).data_type(), &DataType::Float64);
        assert!(!arrow.field(3).is_nullable());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = FeatureSchema::new(vec![
            Attribute::input("a", ValueKind::Continuous, 0.0, 1.0).selected_at(0),
            Attribute::fixed("a", 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, PredictError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_gap_in_selected_positions() {
        let err = FeatureSchema::new(vec![
            Attribute::input("a", ValueKind::Continuous, 0.0, 1.0).selected_at(0),
            Attribute::input("b", ValueKind::Continuous, 0.0, 1.0).selected_at(2),
        ])
        .unwrap_err();
        assert!(matches!(err, PredictError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_non_finite_default() {
        let err = FeatureSchema::new(vec![
            Attribute::input("a", ValueKind::Continuous, 0.0, 1.0).selected_at(0),
            Attribute::fixed("b", f64::NAN),
        ])
        .unwrap_err();
        assert!(matches!(err, PredictError::InvalidSchema(_)));
    }

    #[test]
    fn validate_ranges_flags_out_of_range_weight() {
        let schema = FeatureSchema::obesity();
        let mut raw = RawInput::new();
        raw.insert("Weight", 250.0);
        match schema.validate_ranges(&raw).unwrap_err() {
            PredictError::OutOfRange {
                attribute,
                min,
                max,
                ..
            } => {
                assert_eq!(attribute, "Weight");
                assert_eq!((min, max), (30.0, 200.0));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_ranges_accepts_bounds() {
        let schema = FeatureSchema::obesity();
        let mut raw = RawInput::new();
        raw.insert("Height", 1.0);
        raw.insert("Age", 110.0);
        raw.insert("TUE", 0.0);
        assert!(schema.validate_ranges(&raw).is_ok());
    }

    #[test]
    fn validate_ranges_rejects_fractional_discrete_values() {
        use crate::record::ObesityInput;

        let schema = FeatureSchema::obesity();
        for (name, value, kind) in [
            ("Gender", 0.5, "binary"),
            ("FCVC", 2.7, "ordinal"),
            ("Age", 25.5, "integer"),
        ] {
            let raw = RawInput::from(ObesityInput::default()).with(name, value);
            match schema.validate_ranges(&raw).unwrap_err() {
                PredictError::InvalidKind {
                    attribute,
                    kind: got,
                    ..
                } => {
                    assert_eq!(attribute, name);
                    assert_eq!(got, kind);
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        // Continuous attributes take any value in range.
        let raw = RawInput::from(ObesityInput::default())
            .with("Weight", 70.25)
            .with("Height", 1.734);
        assert!(schema.validate_ranges(&raw).is_ok());
    }
}
