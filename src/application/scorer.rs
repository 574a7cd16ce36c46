//! Scorer capability. The Decider must function without one
//! configured; `NoopScorer` is the always-available default that
//! keeps every caller's code path identical whether or not a real
//! generative model is wired in.

use crate::domain::ports::{Adjudication, Scorer};
use crate::domain::types::{Action, AggregatedSentiment, SentimentResult};
use async_trait::async_trait;

/// Always returns a neutral `SentimentResult` / HOLD adjudication.
pub struct NoopScorer;

#[async_trait]
impl Scorer for NoopScorer {
    async fn analyze(&self, _texts: &[String], _symbol: &str, _sources: &[String]) -> SentimentResult {
        SentimentResult::neutral()
    }

    async fn decide(
        &self,
        _sentiment: &AggregatedSentiment,
        _technical_signal: Option<i8>,
        _regime: Option<&str>,
    ) -> Adjudication {
        Adjudication {
            action: Action::Hold,
            qty: 0,
            confidence: 0.0,
            reasoning: "no scorer configured".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_scorer_is_always_neutral() {
        let scorer = NoopScorer;
        let result = scorer.analyze(&["text".to_string()], "MNQ", &["news".to_string()]).await;
        assert_eq!(result.score, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.action, Action::Hold);
    }
}
