use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use strum::IntoEnumIterator;
use validator::Validate;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::AppState,
    forecast::{ForecastReport, ForecastRequest},
    ml::ModelFamily,
};

/// A selectable model family
#[derive(Debug, Serialize)]
pub struct FamilyOption {
    pub key: ModelFamily,
    pub label: &'static str,
}

/// Everything a client needs to build a forecast request
#[derive(Debug, Serialize)]
pub struct ForecastOptions {
    pub families: Vec<FamilyOption>,
    pub dates: Vec<NaiveDate>,
    pub hours: Vec<u32>,
    pub timezone: String,
}

/// GET /api/v1/forecast/options
pub async fn get_options(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ForecastOptions>>, ApiError> {
    let today = state.cfg.weather.today()?;
    let families = ModelFamily::iter()
        .map(|key| FamilyOption {
            key,
            label: key.label(),
        })
        .collect();

    Ok(Json(ApiResponse::success(ForecastOptions {
        families,
        dates: state.cfg.weather.horizon_dates(today),
        hours: (0..24).collect(),
        timezone: state.cfg.weather.timezone.clone(),
    })))
}

/// POST /api/v1/forecast
pub async fn run_forecast(
    State(state): State<AppState>,
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ForecastReport>>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let start = Instant::now();
    let report = state.run_forecast(&request).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(report).with_duration(elapsed)))
}
