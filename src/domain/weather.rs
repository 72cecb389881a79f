use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One hourly weather sample at the forecast site.
///
/// Timestamps are naive local times of the site, exactly as the provider
/// reports them. Every measurement is optional: a gap in the provider data
/// stays a gap instead of turning into a made-up number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub time: NaiveDateTime,
    /// Apparent ("feels like") temperature in °C
    pub apparent_temperature_c: Option<f64>,
    /// Relative humidity at 2 m in %
    pub relative_humidity_percent: Option<f64>,
    /// Wind speed at 10 m in km/h
    pub wind_speed_kmh: Option<f64>,
    /// Wind direction at 10 m in degrees
    pub wind_direction_deg: Option<f64>,
    pub precipitation_mm: Option<f64>,
    /// Shortwave solar radiation in W/m2
    pub shortwave_radiation_wm2: Option<f64>,
}

impl WeatherRecord {
    /// A record with no measurements at all.
    pub fn empty(time: NaiveDateTime) -> Self {
        Self {
            time,
            apparent_temperature_c: None,
            relative_humidity_percent: None,
            wind_speed_kmh: None,
            wind_direction_deg: None,
            precipitation_mm: None,
            shortwave_radiation_wm2: None,
        }
    }
}

/// Ordered weather time series, in provider order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSeries {
    records: Vec<WeatherRecord>,
}

impl WeatherSeries {
    pub fn new(records: Vec<WeatherRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Row position of the first record at `time`.
    pub fn position_of(&self, time: NaiveDateTime) -> Option<usize> {
        self.records.iter().position(|r| r.time == time)
    }

    pub fn get(&self, time: NaiveDateTime) -> Option<&WeatherRecord> {
        self.position_of(time).map(|i| &self.records[i])
    }

    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.records.first().map(|r| r.time)
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.records.last().map(|r| r.time)
    }
}

impl FromIterator<WeatherRecord> for WeatherSeries {
    fn from_iter<I: IntoIterator<Item = WeatherRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_lookup_by_time() {
        let series: WeatherSeries = (0..5).map(|h| WeatherRecord::empty(at(h))).collect();

        assert_eq!(series.len(), 5);
        assert_eq!(series.position_of(at(3)), Some(3));
        assert!(series.get(at(7)).is_none());
        assert_eq!(series.first_time(), Some(at(0)));
        assert_eq!(series.last_time(), Some(at(4)));
    }

    #[test]
    fn test_empty_series() {
        let series = WeatherSeries::default();
        assert!(series.is_empty());
        assert!(series.first_time().is_none());
    }
}
