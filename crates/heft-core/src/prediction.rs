//! The outbound result of one prediction.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::category::ObesityCategory;

/// Predicted category plus the full distribution in label-map order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub category: ObesityCategory,
    /// `probabilities[i]` belongs to `ObesityCategory::ALL[i]`.
    #[serde(serialize_with = "serialize_distribution")]
    pub probabilities: [f64; ObesityCategory::COUNT],
}

impl PredictionResult {
    /// Probability assigned to the predicted category.
    pub fn confidence(&self) -> f64 {
        self.probability(self.category)
    }

    pub fn probability(&self, category: ObesityCategory) -> f64 {
        self.probabilities[category.class_id() as usize]
    }

    /// Categories zipped with their probabilities, in label-map order.
    pub fn distribution(&self) -> impl Iterator<Item = (ObesityCategory, f64)> + '_ {
        ObesityCategory::ALL
            .iter()
            .copied()
            .zip(self.probabilities.iter().copied())
    }

    /// Categories sorted by descending probability.
    pub fn ranked(&self) -> Vec<(ObesityCategory, f64)> {
        let mut ranked: Vec<_> = self.distribution().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Combined probability of the overweight levels and obesity types.
    pub fn overweight_mass(&self) -> f64 {
        self.distribution()
            .filter(|(c, _)| c.is_overweight_or_worse())
            .map(|(_, p)| p)
            .sum()
    }
}

fn serialize_distribution<S: Serializer>(
    probabilities: &[f64; ObesityCategory::COUNT],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(probabilities.len()))?;
    for (category, p) in ObesityCategory::ALL.iter().zip(probabilities) {
        map.serialize_entry(category.as_str(), p)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PredictionResult {
        PredictionResult {
            category: ObesityCategory::OverweightLevelI,
            probabilities: [0.05, 0.25, 0.05, 0.0, 0.0, 0.5, 0.15],
        }
    }

    #[test]
    fn confidence_is_probability_of_category() {
        assert_eq!(sample().confidence(), 0.5);
    }

    #[test]
    fn ranked_is_descending() {
        let ranked = sample().ranked();
        assert_eq!(ranked.len(), 7);
        assert_eq!(ranked[0].0, ObesityCategory::OverweightLevelI);
        assert_eq!(ranked[1].0, ObesityCategory::NormalWeight);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn overweight_mass_sums_heavy_categories() {
        assert!((sample().overweight_mass() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn json_keeps_label_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.starts_with(r#"{"category":"Overweight_Level_I","probabilities":{"Insufficient_Weight":0.05,"#));
        assert!(json.ends_with(r#""Overweight_Level_II":0.15}}"#));
    }
}
