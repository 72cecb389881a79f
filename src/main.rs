use anyhow::Result;
use clap::Parser;
use gridcast::{
    api,
    cli::{Args, Command},
    config::Config,
    controller::{self, AppState},
    forecast::ForecastRequest,
    telemetry,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    telemetry::init_tracing(args.log_format);

    let cfg = Config::load()?;
    let state = AppState::new(cfg.clone())?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, cfg).await,
        Command::Forecast { family, date, hour } => {
            state.initialize_weather().await;
            let request = ForecastRequest::new(family, date, hour);
            let report = state.run_forecast(&request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::RefreshWeather => {
            let series = state.refresh_weather().await?;
            info!(
                records = series.len(),
                path = %state.cache.path().display(),
                "weather cache refreshed"
            );
            Ok(())
        }
    }
}

async fn serve(state: AppState, cfg: Config) -> Result<()> {
    let app = api::router(state.clone(), &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0, the service is reachable from the network");
    }

    info!(%addr, "starting gridcast");

    controller::spawn_controller_tasks(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            telemetry::shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    warn!("shutdown complete");
    Ok(())
}
