//! Port interfaces. Every external collaborator (broker, collector,
//! scorer, persistence, clock) is expressed as a trait so the
//! supervisor can be built, and tested, against mocks.

use crate::domain::types::{
    AggregatedSentiment, Balance, Bar, DailyPerformance, FillEvent, JournalStatistics, Observation,
    Order, PositionUpdate, Quote, SentimentResult, Symbol, Tick, TradeRecord,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::Receiver;

/// One event off the broker's market-data stream.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// May batch multiple quote entries in a single frame.
    QuoteUpdate(Vec<Quote>),
    DomUpdate {
        symbol: Symbol,
    },
    BarUpdate {
        symbol: Symbol,
        bar: Bar,
    },
    TickUpdate {
        symbol: Symbol,
        tick: Tick,
    },
}

/// One event off the broker's user (order/account) stream.
#[derive(Debug, Clone)]
pub enum UserEvent {
    OrderUpdate(Order),
    PositionUpdate(PositionUpdate),
    FillEvent(FillEvent),
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub action: crate::domain::types::Action,
    pub qty: u32,
    pub order_type: crate::domain::types::OrderType,
    pub price: Option<rust_decimal::Decimal>,
    pub stop_price: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Clone)]
pub struct BracketRequest {
    pub symbol: Symbol,
    pub action: crate::domain::types::Action,
    pub qty: u32,
    pub stop_loss: rust_decimal::Decimal,
    pub take_profit: rust_decimal::Decimal,
}

/// Authenticated session, REST surface, and the two bidirectional
/// streams exposed by the brokerage.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;

    async fn place_order(&self, req: OrderRequest) -> Result<Order>;
    async fn place_bracket(&self, req: BracketRequest) -> Result<Order>;
    async fn cancel_order(&self, order_id: i64) -> Result<()>;
    async fn modify_order(
        &self,
        order_id: i64,
        price: Option<rust_decimal::Decimal>,
        stop_price: Option<rust_decimal::Decimal>,
    ) -> Result<()>;
    async fn liquidate(&self, symbol: &str) -> Result<()>;

    async fn get_positions(&self) -> Result<Vec<PositionUpdate>>;
    async fn get_orders(&self) -> Result<Vec<Order>>;
    async fn get_balance(&self) -> Result<Balance>;
    async fn get_historical_bars(
        &self,
        symbol: &str,
        interval_minutes: u32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>>;

    async fn subscribe_quote(&self, symbol: &str) -> Result<()>;
    async fn subscribe_bar(&self, symbol: &str, interval_minutes: u32) -> Result<()>;

    /// Producer stream of market-data events. Call once per process
    /// lifetime; the port owns fan-out internally if called again after
    /// reconnect.
    fn market_events(&self) -> Receiver<MarketEvent>;
    /// Producer stream of order/position/fill events.
    fn user_events(&self) -> Receiver<UserEvent>;
}

/// Uniform interface implemented by every textual-signal source
/// (micro-blog, forum, news). Failures are contained inside the
/// implementation: `collect` never propagates an error, it returns an
/// empty list and logs.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Source name used in `AggregatedSentiment::per_source_breakdown`
    /// keys and log lines.
    fn name(&self) -> &'static str;
    /// Whether credentials/config make this collector usable. A
    /// disabled collector still implements `collect` but it is never
    /// invoked by the supervisor.
    async fn initialize(&self) -> bool;
    /// Newest-first, truncated to `limit`.
    async fn collect(&self, symbol: &str, limit: usize) -> Vec<Observation>;
}

/// Rule-based fallback output from `Scorer::decide`.
#[derive(Debug, Clone)]
pub struct Adjudication {
    pub action: crate::domain::types::Action,
    pub qty: u32,
    pub confidence: f64,
    pub reasoning: String,
}

/// Replaceable generative-AI text scoring capability. The Decider must
/// function without one configured — see `application::scorer::NoopScorer`.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn analyze(
        &self,
        texts: &[String],
        symbol: &str,
        sources: &[String],
    ) -> SentimentResult;

    async fn decide(
        &self,
        sentiment: &AggregatedSentiment,
        technical_signal: Option<i8>,
        regime: Option<&str>,
    ) -> Adjudication;
}

/// Optional SQL-backed persistence port. Failures here
/// must never affect the core decision pipeline — callers log and
/// continue rather than propagate.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn record_trade(&self, trade: &TradeRecord) -> Result<i64>;
    async fn update_trade_exit(
        &self,
        trade_id: i64,
        exit_price: rust_decimal::Decimal,
        realized_pnl: rust_decimal::Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn record_sentiment(&self, sentiment: &AggregatedSentiment) -> Result<()>;
    async fn get_daily_performance(&self, date: chrono::NaiveDate) -> Result<DailyPerformance>;
    async fn get_statistics(&self) -> Result<JournalStatistics>;
}

/// Wall-clock access, injected so Aggregator/RiskGate/cooldown
/// accounting can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
