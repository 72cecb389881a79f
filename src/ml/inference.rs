//! ML Model Inference Engine
//!
//! The registry is built once at startup and never mutated afterwards, so it
//! is shared behind an `Arc` without locking.

use super::{
    models::{ArtifactError, MLModel, ModelArtifact},
    FeatureVector, ModelKey, ModelMetadata, Prediction,
};
use crate::forecast::FeatureRow;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model '{0}' is not loaded")]
    UnknownModel(ModelKey),
    #[error("model '{model}' is missing input columns: {}", missing.join(", "))]
    MissingFeatures { model: ModelKey, missing: Vec<String> },
    #[error("model '{model}' failed: {message}")]
    Model { model: ModelKey, message: String },
}

/// Read-only collection of loaded models
#[derive(Default, Clone)]
pub struct ModelRegistry {
    models: BTreeMap<ModelKey, Arc<dyn MLModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration, used while assembling the registry
    pub fn with_model(mut self, key: ModelKey, model: Arc<dyn MLModel>) -> Self {
        self.models.insert(key, model);
        self
    }

    /// Load every known model key from `<dir>/<key>_model.json`.
    ///
    /// Missing files are skipped with a warning; their keys then report
    /// [`PredictionError::UnknownModel`]. Malformed files are an error.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ArtifactError> {
        let mut registry = Self::new();
        for key in ModelKey::all() {
            let path = dir.join(key.file_name());
            if !path.exists() {
                warn!(model = %key, path = %path.display(), "model artifact not found, skipping");
                continue;
            }
            let artifact = ModelArtifact::load(&path)?;
            info!(
                model = %key,
                model_id = %artifact.metadata.model_id,
                features = artifact.metadata.feature_names.len(),
                "model loaded"
            );
            registry = registry.with_model(key, Arc::new(artifact));
        }
        Ok(registry)
    }

    pub fn get(&self, key: ModelKey) -> Option<Arc<dyn MLModel>> {
        self.models.get(&key).cloned()
    }

    pub fn contains(&self, key: ModelKey) -> bool {
        self.models.contains_key(&key)
    }

    pub fn metadata(&self) -> Vec<(ModelKey, ModelMetadata)> {
        self.models
            .iter()
            .map(|(k, m)| (*k, m.metadata().clone()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Routes feature rows to models and detransforms the output
#[derive(Clone)]
pub struct PredictionDispatcher {
    registry: Arc<ModelRegistry>,
}

impl PredictionDispatcher {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Slice `row` to the model's input columns, in the model's order
    pub fn prepare(&self, key: ModelKey, row: &FeatureRow) -> Result<FeatureVector, PredictionError> {
        let model = self
            .registry
            .get(key)
            .ok_or(PredictionError::UnknownModel(key))?;
        slice_row(key, model.as_ref(), row)
    }

    /// Run one prediction and apply `exp(raw) - 1`
    pub fn predict(&self, key: ModelKey, row: &FeatureRow) -> Result<Prediction, PredictionError> {
        let model = self
            .registry
            .get(key)
            .ok_or(PredictionError::UnknownModel(key))?;
        let features = slice_row(key, model.as_ref(), row)?;

        let raw = model
            .predict(&features)
            .map_err(|e| PredictionError::Model {
                model: key,
                message: e.to_string(),
            })?;
        debug!(model = %key, variant = %row.variant, raw, "prediction");
        Ok(Prediction::from_raw(key, raw))
    }

    /// Like [`predict`](Self::predict), but absent instead of an error
    pub fn try_predict(&self, key: ModelKey, row: &FeatureRow) -> Option<f64> {
        match self.predict(key, row) {
            Ok(p) => Some(p.value),
            Err(e) => {
                warn!(model = %key, error = %e, "prediction failed");
                None
            }
        }
    }
}

fn slice_row(
    key: ModelKey,
    model: &dyn MLModel,
    row: &FeatureRow,
) -> Result<FeatureVector, PredictionError> {
    let names = &model.metadata().feature_names;
    let values = row
        .select(names.as_slice())
        .map_err(|missing| PredictionError::MissingFeatures {
            model: key,
            missing,
        })?;
    Ok(FeatureVector {
        features: values,
        feature_names: names.clone(),
    })
}
