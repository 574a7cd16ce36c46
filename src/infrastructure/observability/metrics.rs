//! Prometheus metrics for the decision-engine process, plus a JSON
//! snapshot consumed by the HTTP façade's `/metrics` endpoint (§6). The
//! two surfaces report the same underlying counters/gauges: Prometheus
//! text exposition for an external scraper, JSON for the dashboard
//! payload core spec §6 names.

use crate::application::risk_gate::RiskGate;
use chrono::{DateTime, Utc};
use prometheus::{
    core::{AtomicF64, GenericGauge},
    CounterVec, Gauge, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    started_at: DateTime<Utc>,
    total_requests: Arc<AtomicU64>,
    signals_total: CounterVec,
    last_signal_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    uptime_seconds: GenericGauge<AtomicF64>,
}

#[derive(Debug, Serialize)]
pub struct SignalCounts {
    #[serde(rename = "BUY")]
    pub buy: u64,
    #[serde(rename = "SELL")]
    pub sell: u64,
    #[serde(rename = "HOLD")]
    pub hold: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub signals_generated: SignalCounts,
    pub last_signal_time: Option<DateTime<Utc>>,
    pub uptime_seconds: f64,
    pub risk_stats: crate::domain::types::RiskBudget,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let signals_total = CounterVec::new(
            Opts::new("sentinel_signals_total", "Total trade signals generated by action"),
            &["action"],
        )?;
        registry.register(Box::new(signals_total.clone()))?;

        let uptime_seconds =
            Gauge::with_opts(Opts::new("sentinel_uptime_seconds", "Process uptime in seconds"))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            started_at: Utc::now(),
            total_requests: Arc::new(AtomicU64::new(0)),
            signals_total,
            last_signal_time: Arc::new(Mutex::new(None)),
            uptime_seconds,
        })
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal(&self, action: &str) {
        self.signals_total.with_label_values(&[action]).inc();
        *self.last_signal_time.lock().unwrap() = Some(Utc::now());
    }

    /// Render the Prometheus text-exposition body for an external scraper.
    pub fn render_prometheus(&self) -> String {
        self.uptime_seconds.set((Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0);
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    /// Build the `/metrics` JSON dashboard payload.
    pub fn snapshot(&self, risk_gate: &RiskGate) -> MetricsSnapshot {
        let buy = self.signals_total.with_label_values(&["BUY"]).get() as u64;
        let sell = self.signals_total.with_label_values(&["SELL"]).get() as u64;
        let hold = self.signals_total.with_label_values(&["HOLD"]).get() as u64;

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            signals_generated: SignalCounts { buy, sell, hold },
            last_signal_time: *self.last_signal_time.lock().unwrap(),
            uptime_seconds: (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0,
            risk_stats: risk_gate.snapshot(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create default Metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::SystemClock;
    use crate::application::risk_gate::RiskGateConfig;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn test_risk_gate() -> RiskGate {
        RiskGate::new(
            RiskGateConfig {
                max_daily_loss: dec!(500),
                max_trades_per_day: 10,
                account_size: dec!(50000),
                risk_pct: 1.0,
                max_position_size: 5,
                stop_multiplier: 1.5,
                target_multiplier: 2.0,
            },
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn render_prometheus_includes_metric_prefix() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.render_prometheus().contains("sentinel_"));
    }

    #[test]
    fn record_signal_updates_snapshot_counts_and_timestamp() {
        let metrics = Metrics::new().unwrap();
        metrics.record_signal("BUY");
        metrics.record_signal("BUY");
        metrics.record_signal("HOLD");
        let gate = test_risk_gate();
        let snapshot = metrics.snapshot(&gate);
        assert_eq!(snapshot.signals_generated.buy, 2);
        assert_eq!(snapshot.signals_generated.hold, 1);
        assert!(snapshot.last_signal_time.is_some());
    }

    #[test]
    fn record_request_increments_total() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request();
        metrics.record_request();
        let gate = test_risk_gate();
        assert_eq!(metrics.snapshot(&gate).total_requests, 2);
    }
}
