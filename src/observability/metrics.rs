use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Provider metrics
    pub token_requests: IntCounterVec,
    pub token_exchanges: IntCounterVec,
    pub token_exchange_failures: IntCounterVec,
    pub token_exchange_duration: HistogramVec,
    pub token_expiry_unix: IntGaugeVec,

    // Fixture metrics
    pub probe_results: IntCounterVec,
    pub probe_duration: HistogramVec,

    // Config/runtime
    pub config_validation_errors: IntGauge,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("satokenagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Provider
            token_requests: IntCounterVec::new(Opts::new("token_requests_total", "get_token calls by outcome"),&["outcome"],).unwrap(),
            token_exchanges: IntCounterVec::new(Opts::new("token_exchanges_total", "Assertion exchanges sent to the token endpoint"),&["scopes"],).unwrap(),
            token_exchange_failures: IntCounterVec::new(Opts::new("token_exchange_failures_total", "Refresh failures by reason"),&["scopes", "reason"],).unwrap(),
            token_exchange_duration: HistogramVec::new(HistogramOpts::new("token_exchange_duration_seconds", "Sign + exchange duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["scopes"],).unwrap(),
            token_expiry_unix: IntGaugeVec::new(Opts::new("token_expiry_unix_seconds", "Expiry of the cached token"),&["scopes"],).unwrap(),

            // Fixture
            probe_results: IntCounterVec::new(Opts::new("probe_results_total", "Probe outcomes"),&["probe", "result"],).unwrap(),
            probe_duration: HistogramVec::new(HistogramOpts::new("probe_duration_seconds", "Probe request duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),&["probe"],).unwrap(),

            // Config/runtime
            config_validation_errors: IntGauge::new("config_validation_errors","Validation errors found in the loaded config",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_requests.clone())).unwrap();
        reg.register(Box::new(metrics.token_exchanges.clone())).unwrap();
        reg.register(Box::new(metrics.token_exchange_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_exchange_duration.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.probe_results.clone())).unwrap();
        reg.register(Box::new(metrics.probe_duration.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
