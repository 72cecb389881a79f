use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::ml::ModelFamily;
use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    /// Log output format
    #[arg(long, env = "GRIDCAST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json, global = true)]
    pub log_format: LogFormat,

    /// Run the HTTP service when no command is given
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Start the HTTP service.
    Serve,

    /// Run one forecast and print the report as JSON.
    Forecast {
        /// Model family: random_forest, xgboost or neural_network
        family: ModelFamily,
        /// Local date, YYYY-MM-DD
        date: NaiveDate,
        /// Hour of day
        #[arg(value_parser = clap::value_parser!(u32).range(0..24))]
        hour: u32,
    },

    /// Fetch the weather forecast and overwrite the cache file.
    RefreshWeather,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forecast() {
        let args = Args::try_parse_from(["gridcast", "forecast", "xgboost", "2024-06-03", "14"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Forecast {
                family: ModelFamily::XGBoost,
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                hour: 14,
            })
        );
    }

    #[test]
    fn test_rejects_out_of_range_hour() {
        assert!(Args::try_parse_from(["gridcast", "forecast", "xgboost", "2024-06-03", "24"]).is_err());
        assert!(Args::try_parse_from(["gridcast", "forecast", "svm", "2024-06-03", "1"]).is_err());
    }

    #[test]
    fn test_defaults_to_serve() {
        let args = Args::try_parse_from(["gridcast", "--log-format", "text"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.log_format, LogFormat::Text);
    }
}
