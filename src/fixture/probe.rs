use std::collections::BTreeMap;

use tracing::{error, info};

use crate::config::sources::ProbeConfig;
use crate::credentials::key::ScopeSet;
use crate::fixture::client::{require_fields, ApiFixture, FixtureError};
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;

/// Outcome of one probe run.
#[derive(Debug)]
pub struct ProbeReport {
    pub name: String,
    pub status: Option<u16>,
    pub result: Result<(), FixtureError>,
}

impl ProbeReport {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every probe once, in name order. Token errors fail the probe without retry.
pub async fn run_probes(fixture: &ApiFixture, probes: &BTreeMap<String, ProbeConfig>) -> Vec<ProbeReport> {
    let mut reports = Vec::with_capacity(probes.len());
    for (name, probe) in probes {
        reports.push(run_probe(fixture, name, probe).await);
    }
    let failed = reports.iter().filter(|r| !r.passed()).count();
    info!(total = reports.len(), failed, "probe run finished");
    reports
}

pub async fn run_probe(fixture: &ApiFixture, name: &str, probe: &ProbeConfig) -> ProbeReport {
    let metrics = get_metrics().await;
    let start = get_instant();

    let mut status = None;
    let result = async {
        let scopes = probe.scopes.as_ref().map(ScopeSet::new).transpose()?;
        let response = fixture
            .send(probe.method.clone(), &probe.path, &probe.query, probe.body.as_ref(), scopes.as_ref())
            .await?;
        status = Some(response.status.as_u16());
        let response = response.expect_status(probe.expect_status)?;
        if !probe.expect_fields.is_empty() {
            require_fields(&response.json()?, &probe.expect_fields)?;
        }
        Ok::<(), FixtureError>(())
    }
    .await;

    metrics.probe_duration.with_label_values(&[name]).observe(start.elapsed().as_secs_f64());
    match &result {
        Ok(()) => {
            metrics.probe_results.with_label_values(&[name, "passed"]).inc();
            info!(probe = %name, method = %probe.method, path = %probe.path, status = ?status, "probe passed");
        }
        Err(err) => {
            metrics.probe_results.with_label_values(&[name, "failed"]).inc();
            error!(probe = %name, method = %probe.method, path = %probe.path, status = ?status, error = %err, "probe failed");
        }
    }

    ProbeReport { name: name.to_owned(), status, result }
}
