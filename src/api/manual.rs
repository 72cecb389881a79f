use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::{api::error::ApiError, controller::AppState};

/// GET /api/v1/manual - the user manual PDF
pub async fn get_manual(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let path = &state.cfg.manual.path;
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("User Manual not found!".to_string()))
        }
        Err(e) => Err(ApiError::InternalError(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}
