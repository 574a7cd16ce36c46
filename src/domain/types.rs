use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque contract/instrument key, unique per instrument (e.g. "MNQ").
pub type Symbol = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketImpact {
    Pos,
    Neg,
    Neu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    MicroBlog,
    Forum,
    News,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::MicroBlog => write!(f, "micro-blog"),
            DataSource::Forum => write!(f, "forum"),
            DataSource::News => write!(f, "news"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    Bracket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Working,
    Filled,
    Cancelled,
    Rejected,
}

/// Latest top-of-book snapshot for a symbol. `mid` and `spread` are
/// derived, not stored: `mid = (bid+ask)/2` when both sides are > 0,
/// else `last`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub bid_size: Decimal,
    pub ask_size: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn mid(&self) -> Decimal {
        if self.bid > Decimal::ZERO && self.ask > Decimal::ZERO {
            (self.bid + self.ask) / Decimal::TWO
        } else {
            self.last
        }
    }

    pub fn spread(&self) -> Decimal {
        if self.bid > Decimal::ZERO && self.ask > Decimal::ZERO {
            (self.ask - self.bid).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub complete: bool,
}

impl Bar {
    /// Fold a tick into this (forming) bar: high=max, low=min, close=price, volume+=size.
    pub fn apply_tick(&mut self, price: Decimal, size: Decimal) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += size;
    }

    pub fn seed(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Bar {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
            complete: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub size: Decimal,
    pub bid_snapshot: Decimal,
    pub ask_snapshot: Decimal,
}

/// Incremental indicator state for one symbol. `prev_ema_fast`/`prev_ema_slow`
/// are captured *before* the current update so crossover detection is exact.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IndicatorState {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub prev_ema_fast: Option<f64>,
    pub prev_ema_slow: Option<f64>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
}

/// Crossover/signal readout derived from an `IndicatorState`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IndicatorSignal {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub signal: i8,
    pub cross_up: bool,
    pub cross_down: bool,
}

/// A single collected item of text from a social/news source. Immutable
/// once constructed by a Collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub source: DataSource,
    pub symbol: Symbol,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub engagement_score: f64,
    pub metadata: HashMap<String, String>,
}

impl Observation {
    /// Stable lookup key into a `SentimentResult` map: first 100 characters
    /// of the text. Distinct observations sharing this prefix collide by
    /// design (see Open Question (a)).
    pub fn sentiment_key(&self) -> String {
        self.text.chars().take(100).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub score: f64,
    pub confidence: f64,
    pub action: Action,
    pub reasoning: String,
    pub themes: Vec<String>,
    pub urgency: Urgency,
    pub market_impact: MarketImpact,
    pub timestamp: DateTime<Utc>,
}

impl SentimentResult {
    pub fn neutral() -> Self {
        SentimentResult {
            score: 0.0,
            confidence: 0.0,
            action: Action::Hold,
            reasoning: "no signal".to_string(),
            themes: Vec::new(),
            urgency: Urgency::Low,
            market_impact: MarketImpact::Neu,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedSentiment {
    pub symbol: Symbol,
    pub composite_score: f64,
    pub confidence: f64,
    pub action: Action,
    pub per_source_breakdown: HashMap<String, f64>,
    pub data_points: usize,
    pub window_minutes: i64,
    pub themes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl AggregatedSentiment {
    pub fn empty(symbol: Symbol, window_minutes: i64) -> Self {
        AggregatedSentiment {
            symbol,
            composite_score: 0.0,
            confidence: 0.0,
            action: Action::Hold,
            per_source_breakdown: HashMap::new(),
            data_points: 0,
            window_minutes,
            themes: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Process-wide, per-UTC-date risk budget. `killed` latches true on a
/// breach and only clears on explicit `resume()` or a date rollover.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskBudget {
    pub current_date: chrono::NaiveDate,
    pub daily_pnl: Decimal,
    pub daily_trades: u32,
    pub killed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub qty: Decimal,
    pub avg_price: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn flat(timestamp: DateTime<Utc>) -> Self {
        Position {
            side: Side::Flat,
            qty: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            timestamp,
        }
    }

    /// `side=FLAT` iff `qty=0`, enforced by construction.
    pub fn from_net(net_pos: Decimal, net_price: Decimal, timestamp: DateTime<Utc>) -> Self {
        let side = if net_pos > Decimal::ZERO {
            Side::Long
        } else if net_pos < Decimal::ZERO {
            Side::Short
        } else {
            Side::Flat
        };
        Position {
            side,
            qty: net_pos.abs(),
            avg_price: net_price,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub symbol: Symbol,
    pub action: Action,
    pub qty: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub fill_price: Option<Decimal>,
    pub filled_qty: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    /// Apply a fill; transitions to `Filled` once `filled_qty >= qty`.
    pub fn apply_fill(&mut self, price: Decimal, qty: Decimal) {
        self.fill_price = Some(price);
        self.filled_qty += qty;
        if self.filled_qty >= self.qty {
            self.status = OrderStatus::Filled;
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskParameters {
    pub position_size: u32,
    pub max_loss_per_trade: Decimal,
    pub stop_distance: Decimal,
    pub target_distance: Decimal,
    pub risk_reward_ratio: f64,
    pub allowed: bool,
    pub reason: String,
}

impl RiskParameters {
    pub fn refused(reason: impl Into<String>) -> Self {
        RiskParameters {
            position_size: 0,
            max_loss_per_trade: Decimal::ZERO,
            stop_distance: Decimal::ZERO,
            target_distance: Decimal::ZERO,
            risk_reward_ratio: 0.0,
            allowed: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeIntent {
    pub symbol: Symbol,
    pub action: Action,
    pub qty: u32,
    pub confidence: f64,
    pub sentiment_score: f64,
    pub reasoning: String,
    pub risk: RiskParameters,
}

impl TradeIntent {
    pub fn hold(symbol: Symbol, reasoning: impl Into<String>) -> Self {
        TradeIntent {
            symbol,
            action: Action::Hold,
            qty: 0,
            confidence: 0.0,
            sentiment_score: 0.0,
            reasoning: reasoning.into(),
            risk: RiskParameters::refused("hold"),
        }
    }
}

/// Static per-symbol search-term table used by Collectors to build
/// source queries. Falls back to `[symbol]` for unknown symbols.
#[derive(Debug, Clone)]
pub struct SymbolProfile {
    pub symbol: Symbol,
    pub display_name: String,
    pub micro_blog_terms: Vec<String>,
    pub forum_terms: Vec<String>,
    pub news_terms: Vec<String>,
}

impl SymbolProfile {
    /// Fallback profile for a symbol with no entry in the static table:
    /// every search-term list degenerates to `[symbol]`.
    pub fn fallback(symbol: &str) -> Self {
        SymbolProfile {
            symbol: symbol.to_string(),
            display_name: symbol.to_string(),
            micro_blog_terms: vec![symbol.to_string()],
            forum_terms: vec![symbol.to_string()],
            news_terms: vec![symbol.to_string()],
        }
    }
}

/// A fill or position event as delivered on the broker's user stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEvent {
    pub order_id: i64,
    pub symbol: Symbol,
    pub price: Decimal,
    pub qty: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub symbol: Symbol,
    pub net_pos: Decimal,
    pub net_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Account balance snapshot returned by `getBalance()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: String,
    pub cash_balance: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A row persisted by the Journal port on trade entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Option<i64>,
    pub symbol: Symbol,
    pub action: Action,
    pub qty: u32,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    pub confidence: f64,
    pub sentiment_score: f64,
    pub reasoning: String,
    pub opened_at: DateTime<Utc>,
    pub exit_price: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Aggregate performance for a single UTC date, returned by
/// `Journal::get_daily_performance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPerformance {
    pub date: chrono::NaiveDate,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub realized_pnl: Decimal,
}

/// Lifetime statistics returned by `Journal::get_statistics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalStatistics {
    pub total_trades: u64,
    pub win_rate: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub total_realized_pnl: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_mid_prefers_bid_ask_midpoint() {
        let q = Quote {
            symbol: "MNQ".into(),
            bid: Decimal::new(1000, 2),
            ask: Decimal::new(1002, 2),
            last: Decimal::new(999, 2),
            bid_size: Decimal::ONE,
            ask_size: Decimal::ONE,
            volume: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        assert_eq!(q.mid(), Decimal::new(1001, 2));
    }

    #[test]
    fn quote_mid_falls_back_to_last_when_one_sided() {
        let q = Quote {
            symbol: "MNQ".into(),
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last: Decimal::new(1500, 2),
            bid_size: Decimal::ZERO,
            ask_size: Decimal::ZERO,
            volume: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        assert_eq!(q.mid(), Decimal::new(1500, 2));
    }

    #[test]
    fn position_from_net_flat_iff_zero_qty() {
        let now = Utc::now();
        let flat = Position::from_net(Decimal::ZERO, Decimal::ZERO, now);
        assert_eq!(flat.side, Side::Flat);
        assert_eq!(flat.qty, Decimal::ZERO);

        let long = Position::from_net(Decimal::from(3), Decimal::new(1500, 2), now);
        assert_eq!(long.side, Side::Long);
        assert_eq!(long.qty, Decimal::from(3));
    }

    #[test]
    fn order_becomes_filled_once_filled_qty_reaches_qty() {
        let mut order = Order {
            order_id: 1,
            symbol: "MNQ".into(),
            action: Action::Buy,
            qty: Decimal::from(2),
            order_type: OrderType::Market,
            status: OrderStatus::Working,
            price: None,
            stop_price: None,
            fill_price: None,
            filled_qty: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        order.apply_fill(Decimal::new(1500, 2), Decimal::ONE);
        assert_eq!(order.status, OrderStatus::Working);
        order.apply_fill(Decimal::new(1501, 2), Decimal::ONE);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_qty, order.qty);
    }

    #[test]
    fn sentiment_key_truncates_to_100_chars() {
        let text: String = std::iter::repeat('a').take(250).collect();
        let obs = Observation {
            source: DataSource::News,
            symbol: "MNQ".into(),
            text,
            timestamp: Utc::now(),
            author: None,
            url: None,
            engagement_score: 0.0,
            metadata: HashMap::new(),
        };
        assert_eq!(obs.sentiment_key().len(), 100);
    }
}
