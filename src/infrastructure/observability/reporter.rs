//! Push-based metrics reporter. Periodically dumps the same snapshot
//! the HTTP façade's `/metrics` endpoint serves as a `METRICS_JSON:`-
//! prefixed stdout line, for log-based collectors that can't scrape.
//!
//! **Security**: this component only sends data, never accepts requests.

use crate::application::risk_gate::RiskGate;
use crate::infrastructure::observability::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct MetricsReporter {
    metrics: Metrics,
    risk_gate: Arc<RiskGate>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics, risk_gate: Arc<RiskGate>, interval_seconds: u64) -> Self {
        Self { metrics, risk_gate, interval: Duration::from_secs(interval_seconds) }
    }

    pub async fn run(self) {
        info!(interval = ?self.interval, "metrics reporter starting");

        loop {
            tokio::time::sleep(self.interval).await;

            let snapshot = self.metrics.snapshot(&self.risk_gate);
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    println!("METRICS_JSON:{json}");
                    info!(
                        total_requests = snapshot.total_requests,
                        uptime_seconds = snapshot.uptime_seconds,
                        daily_pnl = %snapshot.risk_stats.daily_pnl,
                        "metrics snapshot"
                    );
                }
                Err(e) => warn!(error = %e, "failed to serialize metrics snapshot"),
            }
        }
    }
}
