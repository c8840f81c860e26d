//! Tunable weights and thresholds for the conversion engine.

use std::path::Path;

use evnorm_core::QualityWeights;
use serde::{Deserialize, Serialize};

use crate::mapping::CanonicalField;
use crate::ConfigError;

/// Per-field contribution to the aggregate confidence. Fields without an
/// entry contribute nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f64,
    pub activity_type: f64,
    pub category: f64,
    pub description: f64,
    pub start_date: f64,
    pub start_time: f64,
    pub end_date: f64,
    pub end_time: f64,
    pub location: f64,
    pub price: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 0.25,
            activity_type: 0.15,
            category: 0.15,
            description: 0.08,
            start_date: 0.12,
            start_time: 0.07,
            end_date: 0.02,
            end_time: 0.02,
            location: 0.08,
            price: 0.06,
        }
    }
}

impl FieldWeights {
    pub fn weight(&self, field: CanonicalField) -> f64 {
        match field {
            CanonicalField::Title => self.title,
            CanonicalField::ActivityType => self.activity_type,
            CanonicalField::Category => self.category,
            CanonicalField::Description => self.description,
            CanonicalField::StartDate => self.start_date,
            CanonicalField::StartTime => self.start_time,
            CanonicalField::EndDate => self.end_date,
            CanonicalField::EndTime => self.end_time,
            CanonicalField::LocationName => self.location,
            CanonicalField::Price => self.price,
            _ => 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        CanonicalField::ALL.iter().map(|f| self.weight(*f)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: FieldWeights,
    pub quality: QualityWeights,
    /// Confidence stamped on fields that have no validator.
    pub unvalidated_confidence: f64,
    /// Confidence stamped on type/category values inferred from free text.
    pub inferred_confidence: f64,
    /// Selected mappings below this confidence produce a warning.
    pub low_confidence_threshold: f64,
    /// Jaro-Winkler similarity above which an unknown raw key is offered as a suggestion.
    pub fuzzy_key_threshold: f64,
    pub raw_sample_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            quality: QualityWeights::default(),
            unvalidated_confidence: 0.8,
            inferred_confidence: 0.5,
            low_confidence_threshold: 0.6,
            fuzzy_key_threshold: 0.88,
            raw_sample_chars: 2000,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one_and_favor_required_fields() {
        let weights = FieldWeights::default();
        assert!((weights.total() - 1.0).abs() < 1e-9);
        let required = weights.title + weights.activity_type + weights.category;
        assert!(required > 0.5);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("low_confidence_threshold: 0.7\nweights:\n  title: 0.4\n").unwrap();
        assert_eq!(config.low_confidence_threshold, 0.7);
        assert_eq!(config.weights.title, 0.4);
        assert_eq!(config.weights.category, 0.15);
        assert_eq!(config.unvalidated_confidence, 0.8);
    }
}
