use thiserror::Error;

/// Errors surfaced by the broker port (REST + bidirectional stream).
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("request rejected: {reason}")]
    Rejected { reason: String },

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors surfaced by a Collector. All are non-fatal to the pipeline;
/// a collector that returns one of these logs and yields an empty list.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("{source_name} disabled: {reason}")]
    Disabled { source_name: String, reason: String },

    #[error("{source_name} request failed: {reason}")]
    RequestFailed { source_name: String, reason: String },
}

/// Errors surfaced by the Scorer. Every variant degrades to a neutral
/// HOLD result rather than propagating.
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("scorer disabled: no credentials configured")]
    Disabled,

    #[error("scorer request failed: {0}")]
    RequestFailed(String),

    #[error("scorer returned unparseable output: {0}")]
    InvalidOutput(String),
}

/// Errors surfaced by RiskGate / order placement preconditions.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("kill switch activated")]
    Killed,

    #[error("daily loss limit reached: ${loss:.2}")]
    DailyLossLimit { loss: f64 },

    #[error("max daily trades reached: {trades}")]
    MaxTradesReached { trades: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_error_formats_timeout() {
        let e = BrokerError::Timeout { secs: 10 };
        assert_eq!(e.to_string(), "request timed out after 10s");
    }

    #[test]
    fn risk_error_formats_daily_loss() {
        let e = RiskError::DailyLossLimit { loss: 512.34 };
        assert!(e.to_string().contains("512.34"));
    }
}
