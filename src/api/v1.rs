use axum::{
    routing::{get, post},
    Router,
};

use crate::controller::AppState;

use super::{diagram, forecast, health, manual, models, weather};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::liveness_check))
        .route("/health", get(health::health_check))
        .route("/forecast", post(forecast::run_forecast))
        .route("/forecast/options", get(forecast::get_options))
        .route("/weather", get(weather::get_weather))
        .route("/weather/refresh", post(weather::refresh_weather))
        .route("/models", get(models::list_models))
        .route("/diagram", get(diagram::get_diagram))
        .route("/manual", get(manual::get_manual))
        .with_state(state)
}
