use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::controller::AppState;
use crate::ml::ModelKey;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    weather: ComponentHealth,
    models: ComponentHealth,
    diagram: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ComponentHealth {
    fn healthy(detail: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            detail: Some(detail.into()),
        }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            detail: Some(detail.into()),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /health
///
/// Always 200; unusable weather data, models or diagram lines are reported
/// as degraded components in the body.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let weather = match state.current_weather().await {
        Some(series) => ComponentHealth::healthy(format!("{} hourly records", series.len())),
        None => ComponentHealth::degraded("weather data unavailable"),
    };

    let registry = state.engine.dispatcher().registry();
    let expected = ModelKey::all().count();
    let models = if registry.count() == expected {
        ComponentHealth::healthy(format!("{} models loaded", registry.count()))
    } else {
        ComponentHealth::degraded(format!("{} of {expected} models loaded", registry.count()))
    };

    let diagram = if state.diagram.is_complete() {
        ComponentHealth::healthy(format!("{} lines", state.diagram.diagram.lines.len()))
    } else {
        ComponentHealth::degraded(format!("{} unresolved lines", state.diagram.unresolved.len()))
    };

    let all_healthy = weather.is_healthy() && models.is_healthy() && diagram.is_healthy();
    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            weather,
            models,
            diagram,
        },
    };

    (StatusCode::OK, Json(response))
}

/// GET /healthz - Liveness probe
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_health() {
        let health = ComponentHealth::healthy("ok");
        assert!(health.is_healthy());

        let health = ComponentHealth::degraded("weather data unavailable");
        assert_eq!(health.status, "degraded");
        assert!(!health.is_healthy());
    }
}
