//! ML Model Definitions
//!
//! Persisted regressors are stored as JSON artifacts: model metadata (with
//! the ordered input column names) plus one of the model bodies below.
//! Random forests and gradient-boosted ensembles share the tree format and
//! differ only in aggregation; neural networks are plain dense MLPs.

use super::{FeatureVector, ModelMetadata, ModelType};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trait for ML models
#[cfg_attr(test, mockall::automock)]
pub trait MLModel: Send + Sync {
    /// Raw model output for features ordered as `metadata().feature_names`
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Get model type
    fn model_type(&self) -> ModelType {
        self.metadata().model_type
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model artifact '{model_id}': {reason}")]
    Invalid { model_id: String, reason: String },
}

/// Simple Linear Regression Model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    fn evaluate(&self, x: &[f64]) -> f64 {
        x.iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.intercept
    }
}

/// Node of a decision tree, children referenced by index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Branch taken for NaN inputs
        #[serde(default = "default_true")]
        default_left: bool,
    },
    Leaf {
        value: f64,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Average of tree outputs (random forest)
    Mean,
    /// Sum of tree outputs plus `base_score` (gradient boosting)
    Sum,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEnsemble {
    pub trees: Vec<Tree>,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    /// Split goes left on `x <= threshold` instead of `x < threshold`
    #[serde(default)]
    pub inclusive: bool,
}

impl Tree {
    fn evaluate(&self, x: &[f64], inclusive: bool) -> f64 {
        // children always come after their parent, so this terminates
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let v = x[*feature];
                    let go_left = if v.is_nan() {
                        *default_left
                    } else if inclusive {
                        v <= *threshold
                    } else {
                        v < *threshold
                    };
                    index = if go_left { *left } else { *right };
                }
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!(
                        "node {i} splits on feature {feature}, model has {n_features}"
                    ));
                }
                for child in [*left, *right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(format!("node {i} has invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }
}

impl TreeEnsemble {
    fn evaluate(&self, x: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.evaluate(x, self.inclusive)).sum();
        match self.aggregation {
            Aggregation::Mean => total / self.trees.len() as f64,
            Aggregation::Sum => total + self.base_score,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Logistic,
    Identity,
}

impl Activation {
    fn apply(&self, v: f64) -> f64 {
        match self {
            Activation::Relu => v.max(0.0),
            Activation::Tanh => v.tanh(),
            Activation::Logistic => 1.0 / (1.0 + (-v).exp()),
            Activation::Identity => v,
        }
    }
}

/// Input standardization fitted with the network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Fully connected layer, `weights[out][in]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.biases.iter())
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect()
    }
}

/// Multi-layer perceptron with a single linear output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mlp {
    #[serde(default)]
    pub scaler: Option<Scaler>,
    pub layers: Vec<DenseLayer>,
    pub activation: Activation,
}

impl Mlp {
    fn evaluate(&self, features: &FeatureVector) -> Result<f64> {
        let mut x = match &self.scaler {
            Some(s) => features.standardize(&s.mean, &s.scale)?.features,
            None => features.features.clone(),
        };
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x);
            if i < last {
                x.iter_mut().for_each(|v| *v = self.activation.apply(*v));
            }
        }
        Ok(x[0])
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("network has no layers".to_string());
        }
        if let Some(s) = &self.scaler {
            if s.mean.len() != n_features || s.scale.len() != n_features {
                return Err("scaler width does not match feature count".to_string());
            }
        }
        let mut width = n_features;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.biases.len() || layer.weights.is_empty() {
                return Err(format!("layer {i} has mismatched weights and biases"));
            }
            if layer.weights.iter().any(|row| row.len() != width) {
                return Err(format!("layer {i} expects {width} inputs"));
            }
            width = layer.biases.len();
        }
        if width != 1 {
            return Err(format!("network has {width} outputs, expected 1"));
        }
        Ok(())
    }
}

/// Model body of an artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
    Mlp(Mlp),
}

/// Validated, ready-to-run model loaded from disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: ModelSpec,
}

impl ModelArtifact {
    pub fn new(metadata: ModelMetadata, model: ModelSpec) -> Result<Self, ArtifactError> {
        let artifact = Self { metadata, model };
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn from_json(raw: &str) -> Result<Self, ArtifactError> {
        let artifact: ModelArtifact = serde_json::from_str(raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        let n = self.metadata.feature_names.len();
        let check = match &self.model {
            ModelSpec::Linear(m) if m.coefficients.len() != n => Err(format!(
                "{} coefficients for {n} features",
                m.coefficients.len()
            )),
            ModelSpec::Linear(_) => Ok(()),
            ModelSpec::TreeEnsemble(e) if e.trees.is_empty() => {
                Err("ensemble has no trees".to_string())
            }
            ModelSpec::TreeEnsemble(e) => e.trees.iter().try_for_each(|t| t.validate(n)),
            ModelSpec::Mlp(m) => m.validate(n),
        };
        check.map_err(|reason| ArtifactError::Invalid {
            model_id: self.metadata.model_id.clone(),
            reason,
        })
    }
}

impl MLModel for ModelArtifact {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let expected = self.metadata.feature_names.len();
        if features.len() != expected {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                expected,
                features.len()
            );
        }

        match &self.model {
            ModelSpec::Linear(m) => Ok(m.evaluate(&features.features)),
            ModelSpec::TreeEnsemble(e) => Ok(e.evaluate(&features.features)),
            ModelSpec::Mlp(m) => m.evaluate(features),
        }
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(model_type: ModelType, names: &[&str]) -> ModelMetadata {
        ModelMetadata {
            model_id: "test".to_string(),
            model_type,
            version: "1".to_string(),
            trained_at: None,
            feature_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn fv(values: &[f64]) -> FeatureVector {
        let names = (0..values.len()).map(|i| format!("f{i}")).collect();
        FeatureVector::new(values.to_vec(), names).unwrap()
    }

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Tree {
        Tree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                    default_left: true,
                },
                TreeNode::Leaf { value: left },
                TreeNode::Leaf { value: right },
            ],
        }
    }

    #[test]
    fn test_random_forest_mean() {
        let model = ModelArtifact::new(
            metadata(ModelType::RandomForest, &["a", "b"]),
            ModelSpec::TreeEnsemble(TreeEnsemble {
                trees: vec![stump(0, 5.0, 1.0, 3.0), stump(1, 0.5, 2.0, 4.0)],
                aggregation: Aggregation::Mean,
                base_score: 0.0,
                inclusive: true,
            }),
        )
        .unwrap();

        assert_eq!(model.predict(&fv(&[5.0, 1.0])).unwrap(), 2.5); // (1 + 4) / 2
        assert_eq!(model.predict(&fv(&[6.0, 1.0])).unwrap(), 3.5); // (3 + 4) / 2
        assert_eq!(model.predict(&fv(&[f64::NAN, 0.0])).unwrap(), 1.5); // NaN goes left
    }

    #[test]
    fn test_gradient_boosting_sum() {
        let model = ModelArtifact::new(
            metadata(ModelType::GradientBoosting, &["a"]),
            ModelSpec::TreeEnsemble(TreeEnsemble {
                trees: vec![stump(0, 5.0, -0.5, 0.5), stump(0, 2.0, 0.1, 0.2)],
                aggregation: Aggregation::Sum,
                base_score: 0.5,
                inclusive: false,
            }),
        )
        .unwrap();

        // strict split: 5.0 is not < 5.0
        assert!((model.predict(&fv(&[5.0])).unwrap() - 1.2).abs() < 1e-12);
        assert!((model.predict(&fv(&[1.0])).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_mlp_forward() {
        let model = ModelArtifact::new(
            metadata(ModelType::NeuralNetwork, &["a", "b"]),
            ModelSpec::Mlp(Mlp {
                scaler: Some(Scaler {
                    mean: vec![1.0, 0.0],
                    scale: vec![2.0, 1.0],
                }),
                layers: vec![
                    DenseLayer {
                        weights: vec![vec![1.0, 0.0], vec![0.0, -1.0]],
                        biases: vec![0.0, 0.0],
                    },
                    DenseLayer {
                        weights: vec![vec![1.0, 1.0]],
                        biases: vec![0.25],
                    },
                ],
                activation: Activation::Relu,
            }),
        )
        .unwrap();

        // scaled [2, 3]; hidden relu([2, -3]) = [2, 0]; output 2.25
        assert!((model.predict(&fv(&[5.0, 3.0])).unwrap() - 2.25).abs() < 1e-12);
    }

    #[test]
    fn test_linear_from_json() {
        let raw = r#"{
            "metadata": {
                "model_id": "load_lin",
                "model_type": "linear_regression",
                "feature_names": ["Hour", "Month"]
            },
            "model": { "kind": "linear", "coefficients": [0.5, 2.0], "intercept": 1.0 }
        }"#;
        let model = ModelArtifact::from_json(raw).unwrap();
        assert_eq!(model.model_type(), ModelType::LinearRegression);
        assert_eq!(model.predict(&fv(&[2.0, 3.0])).unwrap(), 8.0);
        assert!(model.predict(&fv(&[2.0])).is_err());
    }

    #[test]
    fn test_tree_from_json() {
        let raw = r#"{
            "metadata": {
                "model_id": "gen_xgb",
                "model_type": "gradient_boosting",
                "feature_names": ["Hour"]
            },
            "model": {
                "kind": "tree_ensemble",
                "aggregation": "sum",
                "base_score": 0.5,
                "trees": [
                    { "nodes": [
                        { "feature": 0, "threshold": 12.0, "left": 1, "right": 2 },
                        { "value": 1.0 },
                        { "value": 2.0 }
                    ] }
                ]
            }
        }"#;
        let model = ModelArtifact::from_json(raw).unwrap();
        assert_eq!(model.predict(&fv(&[3.0])).unwrap(), 1.5);
        assert_eq!(model.predict(&fv(&[13.0])).unwrap(), 2.5);
    }

    #[test]
    fn test_invalid_artifacts_rejected() {
        let bad_feature = ModelArtifact::new(
            metadata(ModelType::RandomForest, &["a"]),
            ModelSpec::TreeEnsemble(TreeEnsemble {
                trees: vec![stump(3, 1.0, 0.0, 1.0)],
                aggregation: Aggregation::Mean,
                base_score: 0.0,
                inclusive: true,
            }),
        );
        assert!(matches!(bad_feature, Err(ArtifactError::Invalid { .. })));

        let cyclic = Tree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 0,
                default_left: true,
            }],
        };
        assert!(cyclic.validate(1).is_err());

        let wrong_width = ModelArtifact::new(
            metadata(ModelType::NeuralNetwork, &["a", "b"]),
            ModelSpec::Mlp(Mlp {
                scaler: None,
                layers: vec![DenseLayer {
                    weights: vec![vec![1.0]],
                    biases: vec![0.0],
                }],
                activation: Activation::Tanh,
            }),
        );
        assert!(wrong_width.is_err());

        assert!(matches!(
            ModelArtifact::from_json("{ not json"),
            Err(ArtifactError::Parse(_))
        ));
    }
}
