//! Observability for the decision engine: `Metrics` holds the
//! Prometheus registry and JSON snapshot the HTTP façade's `/metrics`
//! endpoint serves on request, and `MetricsReporter` periodically pushes
//! that same snapshot to stdout as a `METRICS_JSON:`-prefixed line for
//! log-based collectors (Loki, Fluentd, CloudWatch Logs) that can't scrape.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
