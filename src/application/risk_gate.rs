//! Per-process daily risk budget with a latching kill switch, plus
//! confidence/volatility-scaled position sizing. One `RiskGate`
//! instance guards the whole symbol universe; trades are sized, not
//! gated, per symbol.

use crate::domain::ports::Clock;
use crate::domain::types::{RiskBudget, RiskParameters};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RiskGateConfig {
    pub max_daily_loss: Decimal,
    pub max_trades_per_day: u32,
    pub account_size: Decimal,
    pub risk_pct: f64,
    pub max_position_size: u32,
    pub stop_multiplier: f64,
    pub target_multiplier: f64,
}

pub struct RiskGate {
    config: RiskGateConfig,
    clock: Arc<dyn Clock>,
    budget: Mutex<RiskBudget>,
}

impl RiskGate {
    pub fn new(config: RiskGateConfig, clock: Arc<dyn Clock>) -> Self {
        let today = clock.now().date_naive();
        RiskGate {
            config,
            clock,
            budget: Mutex::new(RiskBudget {
                current_date: today,
                daily_pnl: Decimal::ZERO,
                daily_trades: 0,
                killed: false,
            }),
        }
    }

    /// Roll `budget` onto today's UTC date if the date has advanced,
    /// resetting the counters and clearing the kill latch.
    fn roll_if_new_day(&self, budget: &mut RiskBudget) {
        let today = self.clock.now().date_naive();
        if today != budget.current_date {
            info!(previous = %budget.current_date, new = %today, "risk budget rolled over to new UTC date");
            budget.current_date = today;
            budget.daily_pnl = Decimal::ZERO;
            budget.daily_trades = 0;
            budget.killed = false;
        }
    }

    /// `(allowed, reason)`. `reason` is empty when allowed.
    pub fn can_trade(&self) -> (bool, &'static str) {
        let mut budget = self.budget.lock().unwrap();
        self.roll_if_new_day(&mut budget);
        if budget.killed {
            return (false, "kill switch");
        }
        if budget.daily_pnl <= -self.config.max_daily_loss {
            return (false, "daily loss limit");
        }
        if budget.daily_trades >= self.config.max_trades_per_day {
            return (false, "daily trade count");
        }
        (true, "")
    }

    /// Confidence/volatility-scaled position sizing and stop/target
    /// distances. `volatility` is the symbol's current ATR, `price` its
    /// last trade price; both optional because they may be unavailable
    /// before the indicator engine has seeded enough history.
    pub fn calculate(&self, confidence: f64, volatility: Option<f64>, price: Option<f64>) -> RiskParameters {
        let account_size = self.config.account_size.to_f64().unwrap_or(0.0);
        let max_loss_per_trade_f = account_size * (self.config.risk_pct / 100.0) * confidence;
        let max_loss_per_trade = Decimal::try_from(max_loss_per_trade_f).unwrap_or(Decimal::ZERO);

        let base_size: u32 = if confidence < 0.55 {
            0
        } else if confidence < 0.65 {
            1
        } else if confidence < 0.75 {
            2
        } else if confidence < 0.85 {
            3
        } else if confidence < 0.95 {
            4
        } else {
            5.min(self.config.max_position_size)
        };

        let mut position_size = base_size;
        if base_size > 0 {
            if let (Some(vol), Some(px)) = (volatility, price) {
                if px > 0.0 {
                    let ratio = vol / px;
                    let scaled = if ratio > 0.02 {
                        (base_size as f64 * 0.5).round()
                    } else if ratio > 0.01 {
                        (base_size as f64 * 0.75).round()
                    } else {
                        base_size as f64
                    };
                    position_size = (scaled as u32).max(1);
                }
            }
        }
        position_size = position_size.min(self.config.max_position_size);

        let (stop_distance, target_distance) = match (volatility, price) {
            (Some(vol), _) if vol > 0.0 => (vol * self.config.stop_multiplier, vol * self.config.target_multiplier),
            (_, Some(px)) => (px * 0.005, px * 0.01),
            _ => (0.0, 0.0),
        };

        RiskParameters {
            position_size,
            max_loss_per_trade,
            stop_distance: Decimal::try_from(stop_distance).unwrap_or(Decimal::ZERO),
            target_distance: Decimal::try_from(target_distance).unwrap_or(Decimal::ZERO),
            risk_reward_ratio: if stop_distance > 0.0 { target_distance / stop_distance } else { 0.0 },
            allowed: position_size > 0,
            reason: if position_size > 0 { String::new() } else { "confidence below sizing threshold".to_string() },
        }
    }

    /// Record a closed trade's realized P&L, incrementing the trade
    /// count and latching `killed` if the daily loss budget is breached.
    pub fn record_trade(&self, realized_pnl: Decimal) {
        let mut budget = self.budget.lock().unwrap();
        self.roll_if_new_day(&mut budget);
        budget.daily_pnl += realized_pnl;
        budget.daily_trades += 1;
        if budget.daily_pnl <= -self.config.max_daily_loss {
            if !budget.killed {
                warn!(daily_pnl = %budget.daily_pnl, limit = %self.config.max_daily_loss, "daily loss limit breached, kill switch latched");
            }
            budget.killed = true;
        }
    }

    /// Manually latch the kill switch (e.g. an operator command).
    pub fn kill(&self, reason: &str) {
        let mut budget = self.budget.lock().unwrap();
        self.roll_if_new_day(&mut budget);
        budget.killed = true;
        warn!(reason, "risk gate killed manually");
    }

    /// Clear the kill latch without touching `daily_pnl`/`daily_trades`.
    pub fn resume(&self) {
        let mut budget = self.budget.lock().unwrap();
        self.roll_if_new_day(&mut budget);
        budget.killed = false;
        info!("risk gate resumed");
    }

    pub fn snapshot(&self) -> RiskBudget {
        let mut budget = self.budget.lock().unwrap();
        self.roll_if_new_day(&mut budget);
        *budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};

    struct MockClock {
        epoch_seconds: AtomicI64,
    }

    impl MockClock {
        fn new(dt: DateTime<Utc>) -> Self {
            MockClock { epoch_seconds: AtomicI64::new(dt.timestamp()) }
        }

        fn advance_to(&self, dt: DateTime<Utc>) {
            self.epoch_seconds.store(dt.timestamp(), Ordering::SeqCst);
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(self.epoch_seconds.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    fn config() -> RiskGateConfig {
        RiskGateConfig {
            max_daily_loss: Decimal::from(500),
            max_trades_per_day: 3,
            account_size: Decimal::from(50_000),
            risk_pct: 1.0,
            max_position_size: 5,
            stop_multiplier: 1.5,
            target_multiplier: 2.0,
        }
    }

    #[test]
    fn trades_allowed_until_max_trades_reached() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        assert_eq!(gate.can_trade().0, true);
        gate.record_trade(Decimal::from(10));
        gate.record_trade(Decimal::from(10));
        assert_eq!(gate.can_trade().0, true);
        gate.record_trade(Decimal::from(10));
        let (allowed, reason) = gate.can_trade();
        assert!(!allowed);
        assert_eq!(reason, "daily trade count");
    }

    #[test]
    fn kill_switch_latches_on_daily_loss_breach() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        gate.record_trade(Decimal::from(-600));
        let (allowed, reason) = gate.can_trade();
        assert!(!allowed);
        assert_eq!(reason, "kill switch");
        assert!(gate.snapshot().killed);
    }

    #[test]
    fn kill_switch_stays_latched_after_recovering_pnl_same_day() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        gate.record_trade(Decimal::from(-600));
        gate.record_trade(Decimal::from(600));
        assert!(gate.snapshot().killed);
        assert!(!gate.can_trade().0);
    }

    #[test]
    fn resume_clears_kill_without_resetting_pnl() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        gate.record_trade(Decimal::from(-600));
        gate.resume();
        let snap = gate.snapshot();
        assert!(!snap.killed);
        assert_eq!(snap.daily_pnl, Decimal::from(-600));
    }

    #[test]
    fn utc_date_rollover_resets_budget_and_clears_kill() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), Arc::clone(&clock) as Arc<dyn Clock>);
        gate.record_trade(Decimal::from(-600));
        assert!(gate.snapshot().killed);

        clock.advance_to(Utc.with_ymd_and_hms(2026, 1, 2, 0, 1, 0).unwrap());
        let snap = gate.snapshot();
        assert!(!snap.killed);
        assert_eq!(snap.daily_pnl, Decimal::ZERO);
        assert_eq!(snap.daily_trades, 0);
        assert!(gate.can_trade().0);
    }

    #[test]
    fn manual_kill_blocks_trading_immediately() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        assert!(gate.can_trade().0);
        gate.kill("operator request");
        assert!(!gate.can_trade().0);
    }

    #[test]
    fn calculate_position_size_scales_with_confidence_bands() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        assert_eq!(gate.calculate(0.50, None, None).position_size, 0);
        assert_eq!(gate.calculate(0.60, None, None).position_size, 1);
        assert_eq!(gate.calculate(0.70, None, None).position_size, 2);
        assert_eq!(gate.calculate(0.80, None, None).position_size, 3);
        assert_eq!(gate.calculate(0.90, None, None).position_size, 4);
        assert_eq!(gate.calculate(0.96, None, None).position_size, 5);
    }

    #[test]
    fn calculate_halves_size_under_high_volatility_ratio() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        // ratio = 30/1000 = 0.03 > 0.02 -> halve base_size(3) = 1.5 -> round to 2
        let params = gate.calculate(0.80, Some(30.0), Some(1000.0));
        assert_eq!(params.position_size, 2);
    }

    #[test]
    fn calculate_stop_target_fall_back_to_price_when_no_volatility() {
        let clock = Arc::new(MockClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()));
        let gate = RiskGate::new(config(), clock);
        let params = gate.calculate(0.80, None, Some(100.0));
        assert_eq!(params.stop_distance, Decimal::try_from(0.5).unwrap());
        assert_eq!(params.target_distance, Decimal::try_from(1.0).unwrap());
    }
}
