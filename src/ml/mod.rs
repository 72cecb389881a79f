//! Machine Learning Module
//!
//! Pretrained regressors for the load and generation forecasts:
//! - Model keys (forecast target x model family)
//! - Persisted model artifacts and their evaluation
//! - Read-only model registry and prediction dispatch
//!
//! Models are trained offline on `log1p`-transformed targets, so every raw
//! output goes through [`inverse_log_transform`] before it is reported.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub mod inference;
pub mod models;

pub use inference::{ModelRegistry, PredictionDispatcher, PredictionError};
pub use models::{ArtifactError, MLModel, ModelArtifact};

/// What a model forecasts
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum ForecastTarget {
    #[strum(to_string = "load")]
    Load,
    #[strum(to_string = "gen", serialize = "generation")]
    Generation,
}

/// Model family the user picks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ModelFamily {
    #[strum(to_string = "random_forest", serialize = "Random Forest")]
    RandomForest,
    #[strum(to_string = "xgboost", serialize = "xGBoost")]
    #[serde(rename = "xgboost")]
    XGBoost,
    #[strum(to_string = "neural_network", serialize = "Neural Net")]
    NeuralNetwork,
}

impl ModelFamily {
    /// Label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::XGBoost => "xGBoost",
            ModelFamily::NeuralNetwork => "Neural Net",
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            ModelFamily::RandomForest => ModelType::RandomForest,
            ModelFamily::XGBoost => ModelType::GradientBoosting,
            ModelFamily::NeuralNetwork => ModelType::NeuralNetwork,
        }
    }
}

/// Registry key of a model, e.g. `load_xgboost`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelKey {
    pub target: ForecastTarget,
    pub family: ModelFamily,
}

impl ModelKey {
    pub fn new(target: ForecastTarget, family: ModelFamily) -> Self {
        Self { target, family }
    }

    /// All six supported keys
    pub fn all() -> impl Iterator<Item = ModelKey> {
        ForecastTarget::iter()
            .flat_map(|target| ModelFamily::iter().map(move |family| ModelKey::new(target, family)))
    }

    /// Artifact file name inside the model directory
    pub fn file_name(&self) -> String {
        format!("{self}_model.json")
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.target, self.family)
    }
}

impl FromStr for ModelKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (target, family) = s
            .split_once('_')
            .ok_or_else(|| anyhow::anyhow!("invalid model key '{s}'"))?;
        Ok(Self {
            target: target
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown forecast target '{target}'"))?,
            family: family
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown model family '{family}'"))?,
        })
    }
}

impl Serialize for ModelKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LinearRegression,
    RandomForest,
    GradientBoosting,
    NeuralNetwork,
}

/// ML Model Metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub trained_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Input columns, in the order the model consumes them
    pub feature_names: Vec<String>,
}

/// Feature Vector for ML models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub features: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, feature_names: Vec<String>) -> Result<Self> {
        if features.len() != feature_names.len() {
            anyhow::bail!(
                "Feature count mismatch: {} features, {} names",
                features.len(),
                feature_names.len()
            );
        }
        Ok(Self {
            features,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Standardize features using z-score normalization
    pub fn standardize(&self, means: &[f64], stds: &[f64]) -> Result<Self> {
        if means.len() != self.features.len() || stds.len() != self.features.len() {
            anyhow::bail!("Standardization parameter count mismatch");
        }

        let standardized = self
            .features
            .iter()
            .zip(means.iter().zip(stds.iter()))
            .map(|(f, (mean, std))| {
                if std.abs() < 1e-10 {
                    0.0
                } else {
                    (f - mean) / std
                }
            })
            .collect();

        Ok(Self {
            features: standardized,
            feature_names: self.feature_names.clone(),
        })
    }
}

/// Undo the `log1p` target transform applied at training time
pub fn inverse_log_transform(raw: f64) -> f64 {
    raw.exp() - 1.0
}

/// Detransformed model output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub model: ModelKey,
    /// Value in the model's target unit
    pub value: f64,
    /// Model output before the inverse transform
    pub raw: f64,
}

impl Prediction {
    pub fn from_raw(model: ModelKey, raw: f64) -> Self {
        Self {
            model,
            value: inverse_log_transform(raw),
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_key_names() {
        let keys: Vec<String> = ModelKey::all().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "load_random_forest",
                "load_xgboost",
                "load_neural_network",
                "gen_random_forest",
                "gen_xgboost",
                "gen_neural_network",
            ]
        );
    }

    #[test]
    fn test_model_key_parse() {
        let key: ModelKey = "gen_neural_network".parse().unwrap();
        assert_eq!(key.target, ForecastTarget::Generation);
        assert_eq!(key.family, ModelFamily::NeuralNetwork);
        assert_eq!(key.file_name(), "gen_neural_network_model.json");

        assert!("load".parse::<ModelKey>().is_err());
        assert!("load_svm".parse::<ModelKey>().is_err());
    }

    #[test]
    fn test_family_labels_parse() {
        assert_eq!("Random Forest".parse::<ModelFamily>().unwrap(), ModelFamily::RandomForest);
        assert_eq!("xgboost".parse::<ModelFamily>().unwrap(), ModelFamily::XGBoost);
        assert_eq!("XGBOOST".parse::<ModelFamily>().unwrap(), ModelFamily::XGBoost);
        assert_eq!("Neural Net".parse::<ModelFamily>().unwrap(), ModelFamily::NeuralNetwork);
        assert_eq!(ModelFamily::XGBoost.label(), "xGBoost");
    }

    #[test]
    fn test_model_key_serde() {
        let key = ModelKey::new(ForecastTarget::Load, ModelFamily::XGBoost);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"load_xgboost\"");
        let back: ModelKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        let family: ModelFamily = serde_json::from_str("\"xgboost\"").unwrap();
        assert_eq!(family, ModelFamily::XGBoost);
    }

    #[test]
    fn test_inverse_log_transform() {
        assert_eq!(inverse_log_transform(0.0), 0.0);
        assert!((inverse_log_transform(std::f64::consts::LN_2) - 1.0).abs() < 1e-12);

        let key = ModelKey::new(ForecastTarget::Load, ModelFamily::RandomForest);
        let p = Prediction::from_raw(key, 1.0_f64.ln_1p());
        assert!((p.value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_feature_vector_creation() {
        let fv = FeatureVector::new(vec![1.0, 2.0], vec!["f1".to_string(), "f2".to_string()]).unwrap();
        assert_eq!(fv.len(), 2);
        assert!(!fv.is_empty());
        assert!(FeatureVector::new(vec![1.0], vec![]).is_err());
    }

    #[test]
    fn test_feature_vector_standardize() {
        let names = vec!["f1".to_string(), "f2".to_string(), "f3".to_string()];
        let fv = FeatureVector::new(vec![12.0, 20.0, 30.0], names).unwrap();

        let standardized = fv.standardize(&[10.0, 20.0, 30.0], &[2.0, 5.0, 0.0]).unwrap();
        assert_eq!(standardized.features, vec![1.0, 0.0, 0.0]);
    }
}
