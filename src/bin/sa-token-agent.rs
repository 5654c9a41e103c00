use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use reqwest::Client;
use sa_token_agent::config::sources::ApiConfig;
use sa_token_agent::credentials::loader;
use sa_token_agent::fixture::{run_probes, ApiFixture};
use sa_token_agent::resilience::retry::RetrySettings;
use sa_token_agent::server;
use sa_token_agent::utils::config_loader;
use sa_token_agent::utils::constants::{DEFAULT_CONFIG_PATH, DEFAULT_HTTP_TIMEOUT_MS};
use sa_token_agent::utils::logging::{self, LogLevel};
use sa_token_agent::{ProviderSettings, ScopeSet, TokenError, TokenProvider};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long, env = "LOG_LEVEL" , value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Create request client
    // -------------------------------

    let timeout_ms = service_config.settings.http_timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
    let client = Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .context("cannot build http client")?;

    // -------------------------------
    // 3. Load the service account key (fatal on error)
    // -------------------------------

    let credentials = &service_config.credentials;
    let scopes = ScopeSet::new(credentials.scopes.iter().cloned())?;
    let key = loader::load(&credentials.source, scopes)?.with_subject(credentials.subject.clone());

    // -------------------------------
    // 4. One provider for the whole process, warmed with caller-side retry
    // -------------------------------

    let provider = TokenProvider::new(key, client.clone(), ProviderSettings::from_settings(&service_config.settings));
    let retry = RetrySettings::from_config(&service_config.settings.retry);
    let token = retry
        .run_with_retry_if(|| provider.token(), TokenError::is_retryable)
        .await?;
    info!(expires_at = %token.expires_at(), "initial access token acquired");

    // -------------------------------
    // 5. Probes
    // -------------------------------

    let fixture = service_config
        .api
        .as_ref()
        .map(|api| (ApiFixture::new(api.base_url.clone(), client.clone(), provider.clone()), api.clone()));

    let mut failed = 0;
    let mut periodic = false;
    if let Some((fixture, api)) = fixture {
        match api.interval_seconds {
            None => {
                failed = run_probes(&fixture, &api.probes).await.iter().filter(|r| !r.passed()).count();
            }
            Some(interval) => {
                periodic = true;
                tokio::spawn(probe_loop(fixture, api, Duration::from_secs(interval)));
            }
        }
    }

    // -------------------------------
    // 6. Serve metrics / keep probing until interrupted
    // -------------------------------

    if service_config.settings.server.is_some() || periodic {
        tokio::select! {
            served = server::server::start(&service_config.settings) => {
                served?;
                if periodic {
                    tokio::signal::ctrl_c().await?;
                }
            }
            _ = tokio::signal::ctrl_c() => {}
        }
        info!("shutting down");
    }

    if failed > 0 {
        return Err(anyhow!("{} probe(s) failed", failed));
    }
    Ok(())
}

async fn probe_loop(fixture: ApiFixture, api: ApiConfig, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let failed = run_probes(&fixture, &api.probes).await.iter().filter(|r| !r.passed()).count();
        if failed > 0 {
            warn!(failed, "periodic probe run had failures");
        }
    }
}
