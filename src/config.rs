use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::forecast::GeoLocation;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub weather: WeatherConfig,
    pub models: ModelsConfig,
    pub diagram: TopologyConfig,
    pub manual: ManualConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub base_url: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA name of the site timezone
    pub timezone: String,
    /// Forecast horizon in days, today included
    pub horizon_days: u32,
    pub cache_path: PathBuf,
    pub http_timeout_seconds: u64,
    pub max_retries: u32,
    pub refresh_on_start: bool,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            latitude: 33.89,
            longitude: -6.31,
            timezone: "Africa/Casablanca".to_string(),
            horizon_days: 7,
            cache_path: PathBuf::from("weather.csv"),
            http_timeout_seconds: 30,
            max_retries: 3,
            refresh_on_start: true,
        }
    }
}

impl WeatherConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {e}", self.timezone))
    }

    pub fn location(&self) -> GeoLocation {
        GeoLocation {
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone.clone(),
        }
    }

    /// Today's date at the site
    pub fn today(&self) -> Result<NaiveDate> {
        Ok(chrono::Utc::now().with_timezone(&self.tz()?).date_naive())
    }

    /// The selectable forecast dates, starting today
    pub fn horizon_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        today
            .iter_days()
            .take(self.horizon_days.max(1) as usize)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub dir: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// TOML topology file; the built-in topology is used when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualConfig {
    pub path: PathBuf,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("User_Manual.pdf"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::figment("config/default.toml")
            .extract()
            .context("failed to load configuration")
    }

    /// Defaults, then the TOML file (if present), then `GRIDCAST__*` env vars
    pub fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GRIDCAST__").split("__"))
    }
}
