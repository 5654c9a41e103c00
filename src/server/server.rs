use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
}

impl AppState {
    pub fn new(metrics: &Metrics) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
        }
    }
}

pub async fn router(settings_config: &SettingsConfig) -> Router {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics);

    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Serve health and metrics until the process stops. No-op without a `server` block.
pub async fn start(settings_config: &SettingsConfig) -> Result<()> {
    let Some(server) = &settings_config.server else {
        return Ok(());
    };
    let app = router(settings_config).await;

    let bind = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("cannot bind {}", bind))?;
    info!(address = %bind, metrics_path = %settings_config.metrics.path, "http server listening");
    get_metrics().await.up.set(1);
    axum::serve(listener, app).await.context("http server failed")?;

    Ok(())
}
