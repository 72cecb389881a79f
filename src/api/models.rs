use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    api::response::ApiResponse,
    controller::AppState,
    ml::{ModelKey, ModelMetadata},
};

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub key: ModelKey,
    pub metadata: ModelMetadata,
}

/// GET /api/v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<ApiResponse<Vec<ModelInfo>>> {
    let models: Vec<ModelInfo> = state
        .engine
        .dispatcher()
        .registry()
        .metadata()
        .into_iter()
        .map(|(key, metadata)| ModelInfo { key, metadata })
        .collect();
    let count = models.len();
    Json(ApiResponse::success(models).with_count(count))
}
