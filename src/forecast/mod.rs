//! Forecasting pipeline
//!
//! Weather retrieval, feature engineering and the forecast run that turns a
//! (family, date, hour) selection into load and generation predictions.

pub mod engine;
pub mod features;
pub mod holidays;
pub mod weather;

pub use engine::{ForecastEngine, ForecastError, ForecastReport, ForecastRequest};
pub use features::{FeatureBuilder, FeatureError, FeatureRow, FeatureVariant, ForecastRows};
pub use holidays::{AlbertaCalendar, HolidayCalendar};
pub use weather::{GeoLocation, OpenMeteoClient, WeatherCache, WeatherProvider};
