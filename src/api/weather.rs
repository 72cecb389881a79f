//! Weather forecast API endpoints

use axum::{extract::State, Json};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::AppState,
    domain::WeatherRecord,
};

/// Cached weather series
#[derive(Debug, Serialize)]
pub struct WeatherResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub records: Vec<WeatherRecord>,
}

fn not_loaded() -> ApiError {
    ApiError::ServiceUnavailable("weather data unavailable".to_string())
}

/// GET /api/v1/weather
pub async fn get_weather(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<WeatherResponse>>, ApiError> {
    let series = state.current_weather().await.ok_or_else(not_loaded)?;
    let count = series.len();

    Ok(Json(
        ApiResponse::success(WeatherResponse {
            latitude: state.cfg.weather.latitude,
            longitude: state.cfg.weather.longitude,
            first: series.first_time(),
            last: series.last_time(),
            records: series.records().to_vec(),
        })
        .with_count(count),
    ))
}

/// Outcome of a refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub records: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

/// POST /api/v1/weather/refresh
pub async fn refresh_weather(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let series = state
        .refresh_weather()
        .await
        .map_err(|e| ApiError::Upstream(format!("{e:#}")))?;

    Ok(Json(ApiResponse::success(RefreshResponse {
        records: series.len(),
        first: series.first_time(),
        last: series.last_time(),
    })))
}
