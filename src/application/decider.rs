//! Fuses a technical crossover signal with an optional aggregated
//! sentiment view, applies the confidence-driven fusion rules, and
//! (if enabled) defers to an LLM adjudication before sizing the result
//! through `RiskGate::calculate`.

use crate::application::risk_gate::RiskGate;
use crate::domain::ports::Scorer;
use crate::domain::types::{Action, AggregatedSentiment, RiskParameters, Symbol, TradeIntent};

/// Confidence assigned to a technical-only signal; matches the
/// golden-cross scenario where a bare crossover yields a 0.55
/// confidence entry.
const TECHNICAL_BASE_CONFIDENCE: f64 = 0.55;
const OPPOSITE_SIGNAL_HOLD_CONFIDENCE: f64 = 0.3;
const STRONG_SENTIMENT_SCORE_THRESHOLD: f64 = 0.6;
const STRONG_SENTIMENT_CONFIDENCE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct DeciderConfig {
    pub use_technicals: bool,
    pub use_sentiment: bool,
    pub use_llm_adjudication: bool,
    pub confidence_threshold: f64,
}

pub struct Decider<'a> {
    config: DeciderConfig,
    risk_gate: &'a RiskGate,
    scorer: Option<&'a (dyn Scorer + Send + Sync)>,
}

fn action_from_signal(signal: i8) -> Action {
    match signal.signum() {
        1 => Action::Buy,
        -1 => Action::Sell,
        _ => Action::Hold,
    }
}

impl<'a> Decider<'a> {
    pub fn new(config: DeciderConfig, risk_gate: &'a RiskGate, scorer: Option<&'a (dyn Scorer + Send + Sync)>) -> Self {
        Decider { config, risk_gate, scorer }
    }

    fn fuse(&self, technical_signal: i8, sentiment: Option<&AggregatedSentiment>) -> (Action, f64, String) {
        let technical_action = action_from_signal(technical_signal);

        match (self.config.use_technicals, self.config.use_sentiment) {
            (true, false) => {
                let confidence = if technical_action == Action::Hold { 0.0 } else { TECHNICAL_BASE_CONFIDENCE };
                (technical_action, confidence, "technical signal only".to_string())
            }
            (false, true) => match sentiment {
                Some(s) if s.confidence >= self.config.confidence_threshold => {
                    (s.action, s.confidence, "sentiment only".to_string())
                }
                _ => (Action::Hold, 0.0, "sentiment below confidence threshold".to_string()),
            },
            (false, false) => (Action::Hold, 0.0, "both signal modes disabled".to_string()),
            (true, true) => {
                let Some(s) = sentiment else {
                    let confidence = if technical_action == Action::Hold { 0.0 } else { TECHNICAL_BASE_CONFIDENCE * 0.5 };
                    return (technical_action, confidence, "sentiment unavailable, following technical at reduced confidence".to_string());
                };

                let sentiment_action = s.action;
                if technical_action == sentiment_action && technical_action != Action::Hold {
                    let base = TECHNICAL_BASE_CONFIDENCE.max(s.confidence);
                    let confidence = (base * 1.2).min(1.0);
                    (technical_action, confidence, "technical and sentiment agree".to_string())
                } else if technical_action != Action::Hold
                    && sentiment_action != Action::Hold
                    && technical_action != sentiment_action
                {
                    if s.composite_score.abs() > STRONG_SENTIMENT_SCORE_THRESHOLD
                        && s.confidence > STRONG_SENTIMENT_CONFIDENCE_THRESHOLD
                    {
                        (sentiment_action, s.confidence * 0.6, "opposing signals, strong sentiment overrides".to_string())
                    } else {
                        (Action::Hold, OPPOSITE_SIGNAL_HOLD_CONFIDENCE, "opposing signals, holding".to_string())
                    }
                } else if technical_action == Action::Hold && sentiment_action != Action::Hold {
                    (sentiment_action, s.confidence * 0.9, "technical neutral, following sentiment".to_string())
                } else if sentiment_action == Action::Hold && technical_action != Action::Hold {
                    (technical_action, 0.5, "sentiment neutral, following technical".to_string())
                } else {
                    (Action::Hold, 0.0, "no directional signal".to_string())
                }
            }
        }
    }

    /// `volatility`/`price` feed `RiskGate::calculate`'s position
    /// sizing; `regime` is passed through to the optional LLM
    /// adjudication call unchanged.
    pub async fn decide(
        &self,
        symbol: &Symbol,
        technical_signal: i8,
        sentiment: Option<&AggregatedSentiment>,
        volatility: Option<f64>,
        price: Option<f64>,
        regime: Option<&str>,
    ) -> TradeIntent {
        let (mut action, mut confidence, mut reasoning) = self.fuse(technical_signal, sentiment);
        let sentiment_score = sentiment.map(|s| s.composite_score).unwrap_or(0.0);

        let mut llm_qty_override: Option<u32> = None;
        if self.config.use_llm_adjudication {
            if let Some(scorer) = self.scorer {
                let sentiment_view = sentiment.cloned().unwrap_or_else(|| {
                    AggregatedSentiment::empty(symbol.clone(), 60)
                });
                let adjudication = scorer.decide(&sentiment_view, Some(technical_signal), regime).await;
                action = adjudication.action;
                confidence = adjudication.confidence;
                reasoning = adjudication.reasoning;
                llm_qty_override = Some(adjudication.qty);
            }
        }

        if action == Action::Hold {
            let risk = RiskParameters::refused(reasoning.clone());
            return TradeIntent {
                symbol: symbol.clone(),
                action: Action::Hold,
                qty: 0,
                confidence,
                sentiment_score,
                reasoning,
                risk,
            };
        }

        let risk = self.risk_gate.calculate(confidence, volatility, price);
        let qty = llm_qty_override.unwrap_or(risk.position_size);

        if qty == 0 || !risk.allowed {
            return TradeIntent {
                symbol: symbol.clone(),
                action: Action::Hold,
                qty: 0,
                confidence,
                sentiment_score,
                reasoning: "risk sizing produced zero quantity".to_string(),
                risk,
            };
        }

        TradeIntent {
            symbol: symbol.clone(),
            action,
            qty,
            confidence,
            sentiment_score,
            reasoning,
            risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::risk_gate::RiskGateConfig;
    use crate::domain::ports::SystemClock;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn risk_gate() -> RiskGate {
        RiskGate::new(
            RiskGateConfig {
                max_daily_loss: Decimal::from(500),
                max_trades_per_day: 10,
                account_size: Decimal::from(50_000),
                risk_pct: 1.0,
                max_position_size: 5,
                stop_multiplier: 1.5,
                target_multiplier: 2.0,
            },
            Arc::new(SystemClock),
        )
    }

    fn sentiment(action: Action, composite_score: f64, confidence: f64) -> AggregatedSentiment {
        AggregatedSentiment {
            symbol: "MNQ".to_string(),
            composite_score,
            confidence,
            action,
            per_source_breakdown: HashMap::new(),
            data_points: 10,
            window_minutes: 60,
            themes: vec![],
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn technical_only_golden_cross_yields_buy_at_base_confidence() {
        let gate = risk_gate();
        let config = DeciderConfig {
            use_technicals: true,
            use_sentiment: false,
            use_llm_adjudication: false,
            confidence_threshold: 0.55,
        };
        let decider = Decider::new(config, &gate, None);
        let intent = decider.decide(&"MNQ".to_string(), 1, None, Some(1.0), Some(15.0), None).await;
        assert_eq!(intent.action, Action::Buy);
        assert_eq!(intent.confidence, TECHNICAL_BASE_CONFIDENCE);
        assert!(intent.qty >= 1);
    }

    #[tokio::test]
    async fn sentiment_only_holds_below_threshold() {
        let gate = risk_gate();
        let config = DeciderConfig {
            use_technicals: false,
            use_sentiment: true,
            use_llm_adjudication: false,
            confidence_threshold: 0.55,
        };
        let decider = Decider::new(config, &gate, None);
        let weak = sentiment(Action::Buy, 0.8, 0.3);
        let intent = decider.decide(&"MNQ".to_string(), 0, Some(&weak), None, None, None).await;
        assert_eq!(intent.action, Action::Hold);
        assert_eq!(intent.qty, 0);
    }

    #[tokio::test]
    async fn agreeing_signals_boost_confidence_by_1_2x_capped_at_one() {
        let gate = risk_gate();
        let config = DeciderConfig {
            use_technicals: true,
            use_sentiment: true,
            use_llm_adjudication: false,
            confidence_threshold: 0.55,
        };
        let decider = Decider::new(config, &gate, None);
        let strong = sentiment(Action::Buy, 0.9, 0.9);
        let intent = decider.decide(&"MNQ".to_string(), 1, Some(&strong), Some(1.0), Some(100.0), None).await;
        assert_eq!(intent.action, Action::Buy);
        assert!((intent.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn opposing_signals_hold_unless_sentiment_is_strong() {
        let gate = risk_gate();
        let config = DeciderConfig {
            use_technicals: true,
            use_sentiment: true,
            use_llm_adjudication: false,
            confidence_threshold: 0.55,
        };
        let decider = Decider::new(config, &gate, None);

        let mild = sentiment(Action::Sell, -0.4, 0.9);
        let intent = decider.decide(&"MNQ".to_string(), 1, Some(&mild), None, None, None).await;
        assert_eq!(intent.action, Action::Hold);
        assert_eq!(intent.confidence, OPPOSITE_SIGNAL_HOLD_CONFIDENCE);

        let strong = sentiment(Action::Sell, -0.9, 0.9);
        let intent = decider.decide(&"MNQ".to_string(), 1, Some(&strong), Some(1.0), Some(100.0), None).await;
        assert_eq!(intent.action, Action::Sell);
        assert!((intent.confidence - 0.9 * 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn neutral_technical_follows_sentiment_at_90_percent() {
        let gate = risk_gate();
        let config = DeciderConfig {
            use_technicals: true,
            use_sentiment: true,
            use_llm_adjudication: false,
            confidence_threshold: 0.55,
        };
        let decider = Decider::new(config, &gate, None);
        let s = sentiment(Action::Buy, 0.7, 0.8);
        let intent = decider.decide(&"MNQ".to_string(), 0, Some(&s), Some(1.0), Some(100.0), None).await;
        assert_eq!(intent.action, Action::Buy);
        assert!((intent.confidence - 0.8 * 0.9).abs() < 1e-9);
    }
}
