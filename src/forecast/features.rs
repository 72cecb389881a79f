//! Feature engineering for the load and generation models
//!
//! Turns a weather series and a target hour into the named feature row the
//! pretrained regressors were trained on. Column labels are part of the model
//! contract and must match the training exports byte for byte, legacy degree
//! sign encodings included.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use strum::{Display, EnumIter};
use thiserror::Error;

use super::holidays::{AlbertaCalendar, HolidayCalendar};
use crate::domain::{WeatherRecord, WeatherSeries};
use crate::ml::ForecastTarget;

/// Trailing window for the wind averages, in samples
pub const ROLLING_WINDOW: usize = 24;

/// Degree sign as spelled in the load model columns
const LOAD_DEGREE: &str = "Â°";
/// Degree sign as spelled in the generation model columns
const GENERATION_DEGREE: &str = "Ã\u{82}Â°";

pub const COL_HUMIDITY: &str = "Humidity Inst. (%)";
pub const COL_WIND_SPEED: &str = "Wind Speed 10 m Syno. (km/h)";
pub const COL_PRECIPITATION: &str = "Precip. (mm)";
pub const COL_SOLAR_RADIATION: &str = "Incoming Solar Rad. (W/m2)";
pub const COL_WIND_SPEED_AVG: &str = "Wind Speed 10 m Avg. (km/h)";
pub const COL_ZERO_VOLUME: &str = "Zero_Volume";
pub const COL_IS_SOLAR: &str = "Is Solar";

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("no weather data for {0}")]
    NoMatchingRow(NaiveDateTime),
}

/// Which model input a row is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureVariant {
    /// Demand forecast
    Load,
    /// Generation forecast with the solar indicator off
    Wind,
    /// Generation forecast with the solar indicator on and night hours flagged
    Solar,
}

impl FeatureVariant {
    pub fn target(&self) -> ForecastTarget {
        match self {
            FeatureVariant::Load => ForecastTarget::Load,
            FeatureVariant::Wind | FeatureVariant::Solar => ForecastTarget::Generation,
        }
    }

    fn degree(&self) -> &'static str {
        match self {
            FeatureVariant::Load => LOAD_DEGREE,
            FeatureVariant::Wind | FeatureVariant::Solar => GENERATION_DEGREE,
        }
    }

    pub fn temperature_column(&self) -> String {
        format!("Air Temp. Inst. ({}C)", self.degree())
    }

    pub fn wind_direction_column(&self) -> String {
        format!("Wind Dir. 10 m Syno. ({})", self.degree())
    }

    pub fn wind_direction_avg_column(&self) -> String {
        format!("Wind Dir. 10 m Avg. ({})", self.degree())
    }
}

/// Meteorological season (Fall has no feature column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Fall,
        }
    }
}

/// Calendar part of a feature row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub year: i32,
    /// Month (1-12)
    pub month: u32,
    pub day: u32,
    /// Hour of day (0-23)
    pub hour: u32,
    pub month_sin: f64,
    pub month_cos: f64,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub season: Season,
    /// Saturday or Sunday
    pub is_weekend: bool,
    pub is_holiday: bool,
}

/// Solar generation is assumed zero at night: hours 1-7 and 20-23
pub fn is_zero_volume_hour(hour: u32) -> bool {
    (1..=7).contains(&hour) || (20..=23).contains(&hour)
}

/// Trailing mean over `window` samples ending at `index` (inclusive).
///
/// Shorter windows at the start of the series are averaged over what is
/// available; absent samples are skipped.
pub fn rolling_mean_at(values: &[Option<f64>], index: usize, window: usize) -> Option<f64> {
    if index >= values.len() || window == 0 {
        return None;
    }
    let start = (index + 1).saturating_sub(window);
    let (sum, count) = values[start..=index]
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Trailing mean for every position of `values`
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| rolling_mean_at(values, i, window))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub value: f64,
}

/// Named model input for one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    pub variant: FeatureVariant,
    columns: Vec<FeatureColumn>,
}

impl FeatureRow {
    pub fn new(timestamp: NaiveDateTime, variant: FeatureVariant) -> Self {
        Self {
            timestamp,
            variant,
            columns: Vec::with_capacity(24),
        }
    }

    /// Set a column, replacing an existing one with the same name
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.value = value,
            None => self.columns.push(FeatureColumn { name, value }),
        }
    }

    pub fn set_flag(&mut self, name: impl Into<String>, flag: bool) {
        self.set(name, if flag { 1.0 } else { 0.0 });
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Values for `names`, in that order.
    ///
    /// Returns every name that is not present as the error.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<f64>, Vec<String>> {
        let mut values = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.get(name.as_ref()) {
                Some(v) => values.push(v),
                None => missing.push(name.as_ref().to_string()),
            }
        }
        if missing.is_empty() {
            Ok(values)
        } else {
            Err(missing)
        }
    }
}

/// The three rows one forecast run needs
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRows {
    pub load: FeatureRow,
    pub wind: FeatureRow,
    pub solar: FeatureRow,
}

/// Builds feature rows from a weather series
#[derive(Clone)]
pub struct FeatureBuilder {
    calendar: Arc<dyn HolidayCalendar>,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new(Arc::new(AlbertaCalendar))
    }
}

impl FeatureBuilder {
    pub fn new(calendar: Arc<dyn HolidayCalendar>) -> Self {
        Self { calendar }
    }

    /// Calendar features of a timestamp
    pub fn extract_temporal_features(&self, timestamp: NaiveDateTime) -> CalendarFeatures {
        let month = timestamp.month();
        let hour = timestamp.hour();
        let month_angle = 2.0 * PI * month as f64 / 12.0;
        let hour_angle = 2.0 * PI * hour as f64 / 24.0;

        CalendarFeatures {
            year: timestamp.year(),
            month,
            day: timestamp.day(),
            hour,
            month_sin: month_angle.sin(),
            month_cos: month_angle.cos(),
            hour_sin: hour_angle.sin(),
            hour_cos: hour_angle.cos(),
            season: Season::from_month(month),
            is_weekend: timestamp.weekday().num_days_from_monday() >= 5,
            is_holiday: self.calendar.is_holiday(timestamp.date()),
        }
    }

    /// Build the feature row for `timestamp`.
    ///
    /// Wind averages run over the whole series by row position, so the
    /// samples before the target hour contribute to its average.
    pub fn build(
        &self,
        series: &WeatherSeries,
        timestamp: NaiveDateTime,
        variant: FeatureVariant,
    ) -> Result<FeatureRow, FeatureError> {
        let index = series
            .position_of(timestamp)
            .ok_or(FeatureError::NoMatchingRow(timestamp))?;
        let records = series.records();
        let record = &records[index];

        let wind_speeds: Vec<Option<f64>> = records.iter().map(|r| r.wind_speed_kmh).collect();
        let wind_dirs: Vec<Option<f64>> = records.iter().map(|r| r.wind_direction_deg).collect();

        let mut row = FeatureRow::new(timestamp, variant);
        self.add_weather_features(&mut row, record);

        if let Some(avg) = rolling_mean_at(&wind_speeds, index, ROLLING_WINDOW) {
            row.set(COL_WIND_SPEED_AVG, avg);
        }
        if let Some(avg) = rolling_mean_at(&wind_dirs, index, ROLLING_WINDOW) {
            row.set(variant.wind_direction_avg_column(), avg);
        }

        let calendar = self.extract_temporal_features(timestamp);
        add_calendar_features(&mut row, &calendar);

        match variant {
            FeatureVariant::Load => {
                row.set(COL_ZERO_VOLUME, 0.0);
            }
            FeatureVariant::Wind => {
                row.set(COL_ZERO_VOLUME, 0.0);
                row.set(COL_IS_SOLAR, 0.0);
            }
            FeatureVariant::Solar => {
                row.set_flag(COL_ZERO_VOLUME, is_zero_volume_hour(calendar.hour));
                row.set(COL_IS_SOLAR, 1.0);
            }
        }

        Ok(row)
    }

    /// Load, wind and solar rows for one timestamp
    pub fn build_all(
        &self,
        series: &WeatherSeries,
        timestamp: NaiveDateTime,
    ) -> Result<ForecastRows, FeatureError> {
        Ok(ForecastRows {
            load: self.build(series, timestamp, FeatureVariant::Load)?,
            wind: self.build(series, timestamp, FeatureVariant::Wind)?,
            solar: self.build(series, timestamp, FeatureVariant::Solar)?,
        })
    }

    /// Copy raw measurements under their training labels, skipping gaps
    fn add_weather_features(&self, row: &mut FeatureRow, record: &WeatherRecord) {
        let variant = row.variant;
        let raw = [
            (variant.temperature_column(), record.apparent_temperature_c),
            (COL_HUMIDITY.to_string(), record.relative_humidity_percent),
            (COL_WIND_SPEED.to_string(), record.wind_speed_kmh),
            (variant.wind_direction_column(), record.wind_direction_deg),
            (COL_PRECIPITATION.to_string(), record.precipitation_mm),
            (COL_SOLAR_RADIATION.to_string(), record.shortwave_radiation_wm2),
        ];
        for (name, value) in raw {
            if let Some(value) = value {
                row.set(name, value);
            }
        }
    }
}

fn add_calendar_features(row: &mut FeatureRow, calendar: &CalendarFeatures) {
    row.set("Year", calendar.year as f64);
    row.set("Month", calendar.month as f64);
    row.set("Day", calendar.day as f64);
    row.set("Hour", calendar.hour as f64);
    row.set("Month_sin", calendar.month_sin);
    row.set("Month_cos", calendar.month_cos);
    row.set("Hour_sin", calendar.hour_sin);
    row.set("Hour_cos", calendar.hour_cos);
    row.set_flag("Season_Summer", calendar.season == Season::Summer);
    row.set_flag("Season_Winter", calendar.season == Season::Winter);
    row.set_flag("Season_Spring", calendar.season == Season::Spring);
    row.set_flag("is_weekend", calendar.is_weekend);
    row.set_flag("is_public_holiday", calendar.is_holiday);
}
