//! The seven obesity categories and their class ids.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PredictError, Result};

/// Obesity level predicted by the classifier.
///
/// Discriminants are the class ids the model was trained with, and
/// [`ObesityCategory::ALL`] is the label-map order every distribution uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObesityCategory {
    #[serde(rename = "Insufficient_Weight")]
    InsufficientWeight = 0,
    #[serde(rename = "Normal_Weight")]
    NormalWeight = 1,
    #[serde(rename = "Obesity_Type_I")]
    ObesityTypeI = 2,
    #[serde(rename = "Obesity_Type_II")]
    ObesityTypeII = 3,
    #[serde(rename = "Obesity_Type_III")]
    ObesityTypeIII = 4,
    #[serde(rename = "Overweight_Level_I")]
    OverweightLevelI = 5,
    #[serde(rename = "Overweight_Level_II")]
    OverweightLevelII = 6,
}

impl ObesityCategory {
    pub const COUNT: usize = 7;

    pub const ALL: [ObesityCategory; Self::COUNT] = [
        Self::InsufficientWeight,
        Self::NormalWeight,
        Self::ObesityTypeI,
        Self::ObesityTypeII,
        Self::ObesityTypeIII,
        Self::OverweightLevelI,
        Self::OverweightLevelII,
    ];

    pub fn from_class_id(id: u32) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or(PredictError::UnknownClass(id))
    }

    pub fn class_id(&self) -> u32 {
        *self as u32
    }

    /// Label as it appears in the training data.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientWeight => "Insufficient_Weight",
            Self::NormalWeight => "Normal_Weight",
            Self::ObesityTypeI => "Obesity_Type_I",
            Self::ObesityTypeII => "Obesity_Type_II",
            Self::ObesityTypeIII => "Obesity_Type_III",
            Self::OverweightLevelI => "Overweight_Level_I",
            Self::OverweightLevelII => "Overweight_Level_II",
        }
    }

    /// Label with underscores shown as spaces.
    pub fn display_name(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Overweight levels and all obesity types.
    pub fn is_overweight_or_worse(&self) -> bool {
        !matches!(self, Self::InsufficientWeight | Self::NormalWeight)
    }
}

impl fmt::Display for ObesityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_follow_label_map() {
        for (i, category) in ObesityCategory::ALL.iter().enumerate() {
            assert_eq!(category.class_id() as usize, i);
            assert_eq!(ObesityCategory::from_class_id(i as u32).unwrap(), *category);
        }
    }

    #[test]
    fn unknown_class_id_fails() {
        assert!(matches!(
            ObesityCategory::from_class_id(7),
            Err(PredictError::UnknownClass(7))
        ));
    }

    #[test]
    fn display_name_replaces_underscores() {
        assert_eq!(
            ObesityCategory::OverweightLevelII.display_name(),
            "Overweight Level II"
        );
        assert_eq!(ObesityCategory::NormalWeight.to_string(), "Normal_Weight");
    }

    #[test]
    fn serializes_with_training_label() {
        let json = serde_json::to_string(&ObesityCategory::ObesityTypeIII).unwrap();
        assert_eq!(json, "\"Obesity_Type_III\"");
    }

    #[test]
    fn severity_split() {
        let heavy: Vec<_> = ObesityCategory::ALL
            .iter()
            .filter(|c| c.is_overweight_or_worse())
            .collect();
        assert_eq!(heavy.len(), 5);
        assert!(!ObesityCategory::NormalWeight.is_overweight_or_worse());
    }
}
