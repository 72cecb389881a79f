//! Weather forecast integration (Open-Meteo) and the local weather cache
//!
//! The hourly forecast for the site is fetched once per start (or on
//! demand) and written wholesale to a flat CSV file; forecasting always reads
//! from the cached series.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::WeatherConfig;
use crate::domain::{WeatherRecord, WeatherSeries};

/// Hourly variables requested from the provider, also the cache columns
pub const HOURLY_VARIABLES: [&str; 6] = [
    "relativehumidity_2m",
    "apparent_temperature",
    "windspeed_10m",
    "winddirection_10m",
    "precipitation",
    "shortwave_radiation",
];

const CACHE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Geographic location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone the provider reports local times in
    pub timezone: String,
}

/// Source of hourly weather forecasts
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Hourly records for `start..=end` (local dates of the site)
    async fn fetch(
        &self,
        location: &GeoLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WeatherSeries>;
}

/// Open-Meteo forecast API client
pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(cfg: &WeatherConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds))
            .user_agent(concat!("gridcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build weather HTTP client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(cfg.max_retries);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn fetch(
        &self,
        location: &GeoLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WeatherSeries> {
        let start_date = start.format("%Y-%m-%d").to_string();
        let end_date = end.format("%Y-%m-%d").to_string();
        let hourly = HOURLY_VARIABLES.join(",");
        let query = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("hourly", hourly),
            ("start_date", start_date),
            ("end_date", end_date),
            ("timezone", location.timezone.clone()),
        ];

        debug!(url = %self.base_url, %start, %end, "fetching weather forecast");

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .context("Failed to send request to Open-Meteo API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Open-Meteo API returned error status");
            anyhow::bail!("Open-Meteo API error: HTTP {status}: {body}");
        }

        let body: OpenMeteoResponse = response
            .json()
            .await
            .context("Failed to parse Open-Meteo response")?;

        let series = body.hourly.into_series()?;
        info!(
            records = series.len(),
            latitude = location.latitude,
            longitude = location.longitude,
            "weather forecast fetched"
        );
        Ok(series)
    }
}

// Open-Meteo API response structures
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: OpenMeteoHourly,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    #[serde(default)]
    relativehumidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m: Vec<Option<f64>>,
    #[serde(default)]
    winddirection_10m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    shortwave_radiation: Vec<Option<f64>>,
}

impl OpenMeteoHourly {
    fn into_series(self) -> Result<WeatherSeries> {
        let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();
        self.time
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Ok(WeatherRecord {
                    time: parse_timestamp(t)?,
                    apparent_temperature_c: at(&self.apparent_temperature, i),
                    relative_humidity_percent: at(&self.relativehumidity_2m, i),
                    wind_speed_kmh: at(&self.windspeed_10m, i),
                    wind_direction_deg: at(&self.winddirection_10m, i),
                    precipitation_mm: at(&self.precipitation, i),
                    shortwave_radiation_wm2: at(&self.shortwave_radiation, i),
                })
            })
            .collect()
    }
}

/// Parse the timestamp spellings seen in provider payloads and cache files
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    // offset-qualified local times, keep the wall clock
    DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.naive_local())
        .with_context(|| format!("unrecognized timestamp '{raw}'"))
}

/// One row of the cache file
#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    time: String,
    relativehumidity_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    windspeed_10m: Option<f64>,
    winddirection_10m: Option<f64>,
    precipitation: Option<f64>,
    shortwave_radiation: Option<f64>,
}

impl From<&WeatherRecord> for CacheRow {
    fn from(r: &WeatherRecord) -> Self {
        Self {
            time: r.time.format(CACHE_TIME_FORMAT).to_string(),
            relativehumidity_2m: r.relative_humidity_percent,
            apparent_temperature: r.apparent_temperature_c,
            windspeed_10m: r.wind_speed_kmh,
            winddirection_10m: r.wind_direction_deg,
            precipitation: r.precipitation_mm,
            shortwave_radiation: r.shortwave_radiation_wm2,
        }
    }
}

impl TryFrom<CacheRow> for WeatherRecord {
    type Error = anyhow::Error;

    fn try_from(row: CacheRow) -> Result<Self> {
        Ok(Self {
            time: parse_timestamp(&row.time)?,
            apparent_temperature_c: row.apparent_temperature,
            relative_humidity_percent: row.relativehumidity_2m,
            wind_speed_kmh: row.windspeed_10m,
            wind_direction_deg: row.winddirection_10m,
            precipitation_mm: row.precipitation,
            shortwave_radiation_wm2: row.shortwave_radiation,
        })
    }
}

/// Flat CSV weather cache, replaced wholesale on every write
#[derive(Debug, Clone)]
pub struct WeatherCache {
    path: PathBuf,
}

impl WeatherCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read(&self) -> Result<WeatherSeries> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open weather cache: {}", self.path.display()))?;
        read_series(file)
            .with_context(|| format!("Failed to read weather cache: {}", self.path.display()))
    }

    /// Replace the cache file. Rows are staged in a unique temp file beside
    /// the cache and renamed over it.
    pub fn write(&self, series: &WeatherSeries) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            for record in series.records() {
                writer.serialize(CacheRow::from(record))?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace weather cache {}", self.path.display()))?;
        debug!(path = %self.path.display(), records = series.len(), "weather cache written");
        Ok(())
    }
}

/// Read a weather series from CSV; unknown columns are ignored
pub fn read_series<R: std::io::Read>(reader: R) -> Result<WeatherSeries> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (line, result) in reader.deserialize::<CacheRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to parse weather row {}", line + 1))?;
        records.push(WeatherRecord::try_from(row)?);
    }
    Ok(WeatherSeries::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        for raw in [
            "2024-06-03T14:00",
            "2024-06-03T14:00:00",
            "2024-06-03 14:00:00",
            "2024-06-03 14:00",
            "2024-06-03 14:00:00+01:00",
        ] {
            assert_eq!(parse_timestamp(raw).unwrap(), expected, "{raw}");
        }
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_read_pandas_export() {
        // index column and provider extras must be ignored
        let csv = "\
,time,temperature_2m,relativehumidity_2m,apparent_temperature,windspeed_10m,winddirection_10m,precipitation,shortwave_radiation
0,2024-06-03 00:00:00,18.1,80,17.5,12.0,200,0.0,0
1,2024-06-03 01:00:00,17.9,82,,10.0,210,0.1,0
";
        let series = read_series(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);

        let second = &series.records()[1];
        assert_eq!(second.time.hour(), 1);
        assert_eq!(second.apparent_temperature_c, None);
        assert_eq!(second.relative_humidity_percent, Some(82.0));
        assert_eq!(second.wind_direction_deg, Some(210.0));
        assert_eq!(second.precipitation_mm, Some(0.1));
    }

    #[test]
    fn test_cache_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WeatherCache::new(dir.path().join("weather.csv"));
        assert!(!cache.exists());

        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let long: WeatherSeries = (0..48)
            .map(|h| WeatherRecord {
                wind_speed_kmh: Some(h as f64),
                ..WeatherRecord::empty(t0 + chrono::Duration::hours(h))
            })
            .collect();
        cache.write(&long).unwrap();
        assert_eq!(cache.read().unwrap(), long);

        let short: WeatherSeries = vec![WeatherRecord::empty(t0)].into_iter().collect();
        cache.write(&short).unwrap();
        assert_eq!(cache.read().unwrap(), short);
    }

    #[test]
    fn test_concurrent_writes_leave_one_whole_series() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WeatherCache::new(dir.path().join("weather.csv"));
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let make = |hours: i64, wind: f64| -> WeatherSeries {
            (0..hours)
                .map(|h| WeatherRecord {
                    wind_speed_kmh: Some(wind),
                    ..WeatherRecord::empty(t0 + chrono::Duration::hours(h))
                })
                .collect()
        };
        let long = make(4000, 1.0);
        let short = make(2000, 2.0);

        std::thread::scope(|scope| {
            for series in [&long, &short, &long, &short] {
                let cache = cache.clone();
                scope.spawn(move || {
                    for _ in 0..5 {
                        cache.write(series).unwrap();
                    }
                });
            }
        });

        let stored = cache.read().unwrap();
        assert!(stored == long || stored == short, "cache holds {} mixed records", stored.len());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_hourly_payload_to_series() {
        let raw = r#"{
            "latitude": 33.9, "longitude": -6.3,
            "hourly": {
                "time": ["2024-06-03T00:00", "2024-06-03T01:00"],
                "relativehumidity_2m": [80, null],
                "apparent_temperature": [17.5, 17.0],
                "windspeed_10m": [12.0, 10.0],
                "winddirection_10m": [200, 210],
                "precipitation": [0.0, 0.0]
            }
        }"#;
        let body: OpenMeteoResponse = serde_json::from_str(raw).unwrap();
        let series = body.hourly.into_series().unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.records()[0].relative_humidity_percent, Some(80.0));
        assert_eq!(series.records()[1].relative_humidity_percent, None);
        // variable missing from the payload entirely
        assert_eq!(series.records()[0].shortwave_radiation_wm2, None);
    }
}
