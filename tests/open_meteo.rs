//! Open-Meteo client against a mock server

use chrono::NaiveDate;
use gridcast::config::WeatherConfig;
use gridcast::forecast::weather::HOURLY_VARIABLES;
use gridcast::forecast::{OpenMeteoClient, WeatherProvider};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> WeatherConfig {
    WeatherConfig {
        base_url: format!("{}/v1/forecast", server.uri()),
        max_retries: 0,
        ..Default::default()
    }
}

fn range() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 9).unwrap(),
    )
}

#[tokio::test]
async fn test_fetch_hourly_forecast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "33.89"))
        .and(query_param("longitude", "-6.31"))
        .and(query_param("hourly", HOURLY_VARIABLES.join(",")))
        .and(query_param("start_date", "2024-06-03"))
        .and(query_param("end_date", "2024-06-09"))
        .and(query_param("timezone", "Africa/Casablanca"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "latitude": 33.875,
            "longitude": -6.3125,
            "hourly": {
                "time": ["2024-06-03T00:00", "2024-06-03T01:00", "2024-06-03T02:00"],
                "relativehumidity_2m": [81, 83, null],
                "apparent_temperature": [17.2, 16.8, 16.1],
                "windspeed_10m": [9.4, 8.7, 8.1],
                "winddirection_10m": [215, 220, 224],
                "precipitation": [0.0, 0.0, 0.2],
                "shortwave_radiation": [0.0, 0.0, 0.0]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(&server);
    let client = OpenMeteoClient::new(&cfg).unwrap();
    let (start, end) = range();
    let series = client.fetch(&cfg.location(), start, end).await.unwrap();

    assert_eq!(series.len(), 3);
    let last = &series.records()[2];
    assert_eq!(last.time, start.and_hms_opt(2, 0, 0).unwrap());
    assert_eq!(last.relative_humidity_percent, None);
    assert_eq!(last.precipitation_mm, Some(0.2));
    assert_eq!(series.records()[0].wind_direction_deg, Some(215.0));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Cannot initialize WeatherVariable"))
        .mount(&server)
        .await;

    let cfg = config(&server);
    let client = OpenMeteoClient::new(&cfg).unwrap();
    let (start, end) = range();
    let err = client.fetch(&cfg.location(), start, end).await.unwrap_err();
    assert!(err.to_string().contains("HTTP 400"), "{err}");
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": true })))
        .mount(&server)
        .await;

    let cfg = config(&server);
    let client = OpenMeteoClient::new(&cfg).unwrap();
    let (start, end) = range();
    assert!(client.fetch(&cfg.location(), start, end).await.is_err());
}
