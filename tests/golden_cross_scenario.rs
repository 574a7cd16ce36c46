//! End-to-end scenario S1 (§8): a golden cross on the technical engine
//! flows through the Decider into a bracket order, wired the way the
//! Supervisor's decision loop wires them, but assembled by hand here so
//! the test exercises the real cross-module seam rather than any one
//! component's internal mock.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentinel_agent::application::decider::{Decider, DeciderConfig};
use sentinel_agent::application::indicators::{IndicatorParams, Indicators};
use sentinel_agent::application::order_manager::{OrderManager, OrderManagerConfig};
use sentinel_agent::application::risk_gate::{RiskGate, RiskGateConfig};
use sentinel_agent::domain::ports::{BrokerPort, Clock, SystemClock};
use sentinel_agent::domain::types::{Action, Side};
use sentinel_agent::infrastructure::mock::MockBroker;
use std::sync::Arc;

fn closes(values: &[i64]) -> Vec<Decimal> {
    values.iter().map(|v| Decimal::from(*v)).collect()
}

#[tokio::test]
async fn golden_cross_drives_a_buy_bracket_with_atr_derived_stop_and_target() {
    // Fast/slow periods small enough for the short history in §8 S1 to
    // actually produce a crossover within a handful of bars.
    let mut indicators = Indicators::new(IndicatorParams { fast_period: 3, slow_period: 5, atr_period: 14, rsi_period: 14 });

    // Ten flat bars settle both EMAs at 10 with zero true range (no
    // crossover state yet), then the climb from 10 to 11 is exactly
    // where fast overtakes slow (crossover fires on this single bar,
    // per Testable Property #3: exactly one of cross_up/cross_down).
    for c in closes(&[10, 10, 10, 10, 10, 10, 10, 10, 10, 10]) {
        indicators.update(c, c, c);
    }
    assert!(!indicators.signal().cross_up);

    indicators.update(dec!(11), dec!(11), dec!(11));
    let crossing_signal = indicators.signal();
    assert!(crossing_signal.cross_up, "fast EMA should cross above slow EMA as price breaks out of the flat range");
    assert!(!crossing_signal.cross_down, "exactly one of cross_up/cross_down fires per update");
    assert_eq!(crossing_signal.signal, 1);

    // The next update, with no further directional change in the EMA
    // relationship, must not re-fire the crossover.
    indicators.update(dec!(12), dec!(12), dec!(12));
    assert!(!indicators.signal().cross_up, "crossover is an edge event, not a sustained state");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let risk_gate = Arc::new(RiskGate::new(
        RiskGateConfig {
            max_daily_loss: Decimal::from(500),
            max_trades_per_day: 10,
            account_size: Decimal::from(50_000),
            risk_pct: 1.0,
            max_position_size: 5,
            stop_multiplier: 1.5,
            target_multiplier: 2.0,
        },
        Arc::clone(&clock),
    ));

    let decider_config = DeciderConfig {
        use_technicals: true,
        use_sentiment: false,
        use_llm_adjudication: false,
        confidence_threshold: 0.55,
    };
    let decider = Decider::new(decider_config, &risk_gate, None);
    let entry_price = 11.0;
    let intent = decider
        .decide(&"MNQ".to_string(), crossing_signal.signal, None, crossing_signal.atr, Some(entry_price), None)
        .await;

    assert_eq!(intent.action, Action::Buy);
    assert!(intent.qty >= 1);
    let atr = crossing_signal.atr.expect("ATR should be available once a true range has been observed");
    assert!(atr > 0.0);
    let expected_stop_distance = atr * 1.5;
    let expected_target_distance = atr * 2.0;
    assert!((intent.risk.stop_distance.to_f64().unwrap() - expected_stop_distance).abs() < 1e-6);
    assert!((intent.risk.target_distance.to_f64().unwrap() - expected_target_distance).abs() < 1e-6);

    let broker: Arc<dyn BrokerPort> = Arc::new(MockBroker::new());
    let order_manager = OrderManager::new(
        broker,
        Arc::clone(&risk_gate),
        clock,
        OrderManagerConfig { max_position_size: 5, cooldown_seconds: 30 },
    );

    let entry = dec!(11);
    let stop = entry - intent.risk.stop_distance;
    let target = entry + intent.risk.target_distance;
    assert!(stop < entry && entry < target, "a BUY bracket's stop sits below entry and its target above");

    let order = order_manager
        .place_bracket("MNQ", intent.action, intent.qty, stop, target)
        .await
        .expect("bracket should be accepted by the mock broker");

    assert_eq!(order.stop_price, Some(stop));
    assert_eq!(
        order_manager.position("MNQ").side,
        Side::Flat,
        "mock broker never emits a fill on its own, position stays flat until a FillEvent lands"
    );
}
