//! Weather-driven power-grid load and generation forecasting, plus the
//! single-line diagram model of the grid it serves.

pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod domain;
pub mod forecast;
pub mod ml;
pub mod telemetry;
