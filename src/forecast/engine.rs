use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::features::{FeatureBuilder, FeatureError, FeatureRow};
use crate::domain::WeatherSeries;
use crate::ml::{ForecastTarget, ModelFamily, ModelKey, PredictionDispatcher};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("hour {0} is outside 0-23")]
    InvalidHour(u32),
    #[error("no weather data for {0}")]
    MissingData(NaiveDateTime),
    #[error("weather data unavailable")]
    WeatherUnavailable,
    #[error("forecast cancelled")]
    Cancelled,
}

impl From<FeatureError> for ForecastError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::NoMatchingRow(ts) => ForecastError::MissingData(ts),
        }
    }
}

/// User selection: model family, date and hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ForecastRequest {
    pub family: ModelFamily,
    pub date: NaiveDate,
    #[validate(range(min = 0, max = 23))]
    pub hour: u32,
}

impl ForecastRequest {
    pub fn new(family: ModelFamily, date: NaiveDate, hour: u32) -> Self {
        Self { family, date, hour }
    }

    pub fn timestamp(&self) -> Result<NaiveDateTime, ForecastError> {
        self.date
            .and_hms_opt(self.hour, 0, 0)
            .ok_or(ForecastError::InvalidHour(self.hour))
    }
}

/// Outcome of one forecast run; absent values failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub run_id: Uuid,
    pub timestamp: NaiveDateTime,
    pub family: ModelFamily,
    pub load: Option<f64>,
    pub wind: Option<f64>,
    pub solar: Option<f64>,
    pub failures: Vec<String>,
    pub status: String,
    pub generated_at: DateTime<Utc>,
}

impl ForecastReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn format_value(label: &str, value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{label}={v:.2}"),
        None => format!("{label}=n/a"),
    }
}

/// Weather -> features -> predictions pipeline
#[derive(Clone)]
pub struct ForecastEngine {
    dispatcher: PredictionDispatcher,
    builder: FeatureBuilder,
}

impl ForecastEngine {
    pub fn new(dispatcher: PredictionDispatcher, builder: FeatureBuilder) -> Self {
        Self {
            dispatcher,
            builder,
        }
    }

    pub fn dispatcher(&self) -> &PredictionDispatcher {
        &self.dispatcher
    }

    /// Build the three feature rows and run the load, wind and solar
    /// predictions concurrently on the blocking pool.
    pub async fn run(
        &self,
        request: &ForecastRequest,
        weather: &WeatherSeries,
        cancel: &CancellationToken,
    ) -> Result<ForecastReport, ForecastError> {
        if cancel.is_cancelled() {
            return Err(ForecastError::Cancelled);
        }
        let timestamp = request.timestamp()?;
        let rows = self.builder.build_all(weather, timestamp)?;

        let load_key = ModelKey::new(ForecastTarget::Load, request.family);
        let gen_key = ModelKey::new(ForecastTarget::Generation, request.family);

        let predictions = futures::future::join3(
            self.predict_blocking(load_key, rows.load),
            self.predict_blocking(gen_key, rows.wind),
            self.predict_blocking(gen_key, rows.solar),
        );

        let (load, wind, solar) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForecastError::Cancelled),
            out = predictions => out,
        };

        let failures: Vec<String> = [&load, &wind, &solar]
            .into_iter()
            .filter_map(|r| r.as_ref().err().cloned())
            .collect();
        let (load, wind, solar) = (load.ok(), wind.ok(), solar.ok());

        let summary = [
            format_value("solar", solar),
            format_value("wind", wind),
            format_value("load", load),
        ]
        .iter()
        .join(" ");
        let status = if failures.is_empty() {
            format!("Forecasting completed: {summary}")
        } else {
            format!("Forecasting completed with {} failure(s): {summary}", failures.len())
        };

        let report = ForecastReport {
            run_id: Uuid::new_v4(),
            timestamp,
            family: request.family,
            load,
            wind,
            solar,
            failures,
            status,
            generated_at: Utc::now(),
        };
        info!(
            run_id = %report.run_id,
            %timestamp,
            family = %request.family,
            complete = report.is_complete(),
            "forecast run finished"
        );
        Ok(report)
    }

    async fn predict_blocking(&self, key: ModelKey, row: FeatureRow) -> Result<f64, String> {
        let dispatcher = self.dispatcher.clone();
        let variant = row.variant;
        match tokio::task::spawn_blocking(move || dispatcher.predict(key, &row)).await {
            Ok(Ok(prediction)) => Ok(prediction.value),
            Ok(Err(e)) => {
                warn!(model = %key, %variant, error = %e, "prediction failed");
                Err(format!("{variant}: {e}"))
            }
            Err(e) => {
                warn!(model = %key, %variant, error = %e, "prediction task aborted");
                Err(format!("{variant}: prediction task failed: {e}"))
            }
        }
    }
}
