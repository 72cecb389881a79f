#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use gridcast::domain::{WeatherRecord, WeatherSeries};
use gridcast::forecast::{GeoLocation, WeatherProvider};

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub fn at(hour: u32) -> NaiveDateTime {
    day().and_hms_opt(hour, 0, 0).unwrap()
}

/// `hours` complete hourly records starting at midnight of [`day`]
pub fn weather(hours: i64) -> WeatherSeries {
    (0..hours)
        .map(|h| WeatherRecord {
            apparent_temperature_c: Some(18.0 + (h % 24) as f64 * 0.5),
            relative_humidity_percent: Some(60.0),
            wind_speed_kmh: Some(10.0 + (h % 5) as f64),
            wind_direction_deg: Some(200.0),
            precipitation_mm: Some(0.0),
            shortwave_radiation_wm2: Some(if (7..20).contains(&(h % 24)) { 400.0 } else { 0.0 }),
            ..WeatherRecord::empty(at(0) + Duration::hours(h))
        })
        .collect()
}

/// Provider serving a fixed series, or failing when it has none
pub struct StubProvider(pub Option<WeatherSeries>);

#[async_trait]
impl WeatherProvider for StubProvider {
    async fn fetch(
        &self,
        _location: &GeoLocation,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<WeatherSeries> {
        match &self.0 {
            Some(series) => Ok(series.clone()),
            None => anyhow::bail!("weather provider unreachable"),
        }
    }
}
