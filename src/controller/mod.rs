use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{diagram, Diagram, DiagramBuild, WeatherSeries};
use crate::forecast::{
    FeatureBuilder, ForecastEngine, ForecastError, ForecastReport, ForecastRequest, OpenMeteoClient,
    WeatherCache, WeatherProvider,
};
use crate::ml::{ModelRegistry, PredictionDispatcher};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub engine: Arc<ForecastEngine>,
    /// Current weather series, swapped wholesale on refresh
    pub weather: Arc<RwLock<Option<Arc<WeatherSeries>>>>,
    pub diagram: Arc<DiagramBuild>,
    pub provider: Arc<dyn WeatherProvider>,
    pub cache: WeatherCache,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        let registry = ModelRegistry::load_from_dir(&cfg.models.dir)
            .with_context(|| format!("failed to load models from {}", cfg.models.dir.display()))?;
        if registry.is_empty() {
            warn!(dir = %cfg.models.dir.display(), "no model artifacts loaded");
        }
        let engine = ForecastEngine::new(
            PredictionDispatcher::new(Arc::new(registry)),
            FeatureBuilder::default(),
        );

        let topology = match &cfg.diagram.path {
            Some(path) => diagram::DiagramConfig::load(path)?,
            None => diagram::DiagramConfig::builtin(),
        };
        let diagram = Diagram::build(&topology);
        info!(
            elements = diagram.diagram.element_count(),
            lines = diagram.diagram.lines.len(),
            unresolved = diagram.unresolved.len(),
            "diagram built"
        );

        let provider = Arc::new(OpenMeteoClient::new(&cfg.weather)?);
        Ok(Self::with_parts(cfg, engine, provider, diagram))
    }

    /// Assemble state from already-built parts
    pub fn with_parts(
        cfg: Config,
        engine: ForecastEngine,
        provider: Arc<dyn WeatherProvider>,
        diagram: DiagramBuild,
    ) -> Self {
        let cache = WeatherCache::new(cfg.weather.cache_path.clone());
        Self {
            cfg,
            engine: Arc::new(engine),
            weather: Arc::new(RwLock::new(None)),
            diagram: Arc::new(diagram),
            provider,
            cache,
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn current_weather(&self) -> Option<Arc<WeatherSeries>> {
        self.weather.read().await.clone()
    }

    /// Fetch the forecast horizon, overwrite the cache and publish the series
    pub async fn refresh_weather(&self) -> Result<Arc<WeatherSeries>> {
        let today = self.cfg.weather.today()?;
        let horizon = self.cfg.weather.horizon_dates(today);
        let end = horizon.last().copied().unwrap_or(today);
        let location = self.cfg.weather.location();

        let series = tokio::select! {
            _ = self.shutdown.cancelled() => anyhow::bail!("weather refresh cancelled"),
            fetched = self.provider.fetch(&location, today, end) => fetched?,
        };
        let series = Arc::new(series);

        let cache = self.cache.clone();
        let to_write = series.clone();
        tokio::task::spawn_blocking(move || cache.write(&to_write))
            .await
            .context("weather cache writer panicked")??;

        *self.weather.write().await = Some(series.clone());
        info!(records = series.len(), %today, %end, "weather refreshed");
        Ok(series)
    }

    /// Publish whatever the cache file holds
    pub async fn load_cached_weather(&self) -> Result<Arc<WeatherSeries>> {
        let cache = self.cache.clone();
        let series = tokio::task::spawn_blocking(move || cache.read())
            .await
            .context("weather cache reader panicked")??;
        let series = Arc::new(series);
        *self.weather.write().await = Some(series.clone());
        Ok(series)
    }

    /// Refresh on start when configured, falling back to the cache file
    pub async fn initialize_weather(&self) {
        if self.cfg.weather.refresh_on_start {
            match self.refresh_weather().await {
                Ok(_) => return,
                Err(e) => warn!(error = %e, "weather refresh failed, falling back to cache"),
            }
        }
        if !self.cache.exists() {
            warn!(path = %self.cache.path().display(), "no weather cache, forecasts unavailable until a refresh succeeds");
            return;
        }
        match self.load_cached_weather().await {
            Ok(series) => info!(records = series.len(), "weather loaded from cache"),
            Err(e) => warn!(error = %e, "weather cache unreadable"),
        }
    }

    /// Run a forecast against the current weather.
    ///
    /// The run gets a child of the shutdown token that is also cancelled
    /// when the returned future is dropped.
    pub async fn run_forecast(
        &self,
        request: &ForecastRequest,
    ) -> Result<ForecastReport, ForecastError> {
        let weather = self
            .current_weather()
            .await
            .ok_or(ForecastError::WeatherUnavailable)?;
        let cancel = self.shutdown.child_token();
        let _guard = cancel.clone().drop_guard();
        self.engine.run(request, &weather, &cancel).await
    }
}

pub fn spawn_controller_tasks(state: AppState) {
    tokio::spawn(async move {
        state.initialize_weather().await;
    });
}
