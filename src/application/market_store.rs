//! In-memory per-symbol quote, tick ring, bar ring, and current-forming
//! bar. Mutated exclusively by the market-stream task;
//! read by the decision task. Operations are O(1) amortized.

use crate::domain::types::{Bar, Quote, Symbol, Tick};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct SymbolState {
    quote: Option<Quote>,
    ticks: VecDeque<Tick>,
    bars: VecDeque<Bar>,
    forming_bar: Option<Bar>,
}

impl SymbolState {
    fn new() -> Self {
        SymbolState {
            quote: None,
            ticks: VecDeque::new(),
            bars: VecDeque::new(),
            forming_bar: None,
        }
    }
}

pub struct MarketStore {
    tick_capacity: usize,
    bar_capacity: usize,
    symbols: RwLock<HashMap<Symbol, SymbolState>>,
}

impl MarketStore {
    pub fn new(tick_capacity: usize, bar_capacity: usize) -> Arc<Self> {
        Arc::new(MarketStore {
            tick_capacity,
            bar_capacity,
            symbols: RwLock::new(HashMap::new()),
        })
    }

    pub async fn update_quote(&self, quote: Quote) {
        let mut symbols = self.symbols.write().await;
        let state = symbols
            .entry(quote.symbol.clone())
            .or_insert_with(SymbolState::new);
        state.quote = Some(quote);
    }

    pub async fn latest_quote(&self, symbol: &str) -> Option<Quote> {
        self.symbols.read().await.get(symbol).and_then(|s| s.quote.clone())
    }

    /// Apply a `Bar-update` frame. `complete=true` appends to the ring;
    /// `complete=false` replaces the currently-forming bar.
    pub async fn apply_bar(&self, symbol: &str, bar: Bar) {
        let mut symbols = self.symbols.write().await;
        let state = symbols
            .entry(symbol.to_string())
            .or_insert_with(SymbolState::new);

        if bar.complete {
            state.bars.push_back(bar);
            while state.bars.len() > self.bar_capacity {
                state.bars.pop_front();
            }
            state.forming_bar = None;
        } else {
            state.forming_bar = Some(bar);
        }
    }

    /// Apply a tick: append to the ring (FIFO eviction at capacity) and
    /// fold it into the forming bar (seeding one if none exists yet).
    pub async fn apply_tick(&self, symbol: &str, tick: Tick) {
        let mut symbols = self.symbols.write().await;
        let state = symbols
            .entry(symbol.to_string())
            .or_insert_with(SymbolState::new);

        state.ticks.push_back(tick);
        while state.ticks.len() > self.tick_capacity {
            state.ticks.pop_front();
        }

        match state.forming_bar.as_mut() {
            Some(bar) => bar.apply_tick(tick.price, tick.size),
            None => {
                let mut bar = Bar::seed(tick.timestamp, tick.price);
                bar.apply_tick(tick.price, tick.size);
                state.forming_bar = Some(bar);
            }
        }
        debug!(symbol, price = %tick.price, "tick applied");
    }

    /// Historical bars are appended oldest-first and never reordered.
    pub async fn seed_historical_bars(&self, symbol: &str, bars: Vec<Bar>) {
        let mut symbols = self.symbols.write().await;
        let state = symbols
            .entry(symbol.to_string())
            .or_insert_with(SymbolState::new);
        for bar in bars {
            state.bars.push_back(bar);
        }
        while state.bars.len() > self.bar_capacity {
            state.bars.pop_front();
        }
    }

    pub async fn completed_bars(&self, symbol: &str) -> Vec<Bar> {
        self.symbols
            .read()
            .await
            .get(symbol)
            .map(|s| s.bars.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn forming_bar(&self, symbol: &str) -> Option<Bar> {
        self.symbols.read().await.get(symbol).and_then(|s| s.forming_bar)
    }

    /// Best current price for sizing/decision purposes: the live
    /// quote's mid when one has arrived, else the forming bar's close,
    /// else the most recent completed bar's close.
    pub async fn latest_price(&self, symbol: &str) -> Option<rust_decimal::Decimal> {
        let symbols = self.symbols.read().await;
        let state = symbols.get(symbol)?;
        if let Some(quote) = &state.quote {
            return Some(quote.mid());
        }
        if let Some(bar) = &state.forming_bar {
            return Some(bar.close);
        }
        state.bars.back().map(|b| b.close)
    }

    pub async fn tick_count(&self, symbol: &str) -> usize {
        self.symbols
            .read()
            .await
            .get(symbol)
            .map(|s| s.ticks.len())
            .unwrap_or(0)
    }

    pub async fn bar_count(&self, symbol: &str) -> usize {
        self.symbols
            .read()
            .await
            .get(symbol)
            .map(|s| s.bars.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tick(price: Decimal, size: Decimal) -> Tick {
        Tick {
            timestamp: Utc::now(),
            price,
            size,
            bid_snapshot: price,
            ask_snapshot: price,
        }
    }

    #[tokio::test]
    async fn tick_ring_never_exceeds_capacity() {
        let store = MarketStore::new(3, 10);
        for i in 0..10 {
            store.apply_tick("MNQ", tick(Decimal::from(i), dec!(1))).await;
        }
        assert_eq!(store.tick_count("MNQ").await, 3);
    }

    #[tokio::test]
    async fn bar_ring_evicts_oldest_first() {
        let store = MarketStore::new(10, 2);
        for i in 0..5 {
            let bar = Bar {
                timestamp: Utc::now(),
                open: Decimal::from(i),
                high: Decimal::from(i),
                low: Decimal::from(i),
                close: Decimal::from(i),
                volume: Decimal::ZERO,
                complete: true,
            };
            store.apply_bar("MNQ", bar).await;
        }
        let bars = store.completed_bars("MNQ").await;
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, Decimal::from(3));
        assert_eq!(bars[1].close, Decimal::from(4));
    }

    #[tokio::test]
    async fn forming_bar_tracks_high_low_close_volume() {
        let store = MarketStore::new(10, 10);
        store.apply_tick("MNQ", tick(dec!(100), dec!(1))).await;
        store.apply_tick("MNQ", tick(dec!(105), dec!(2))).await;
        store.apply_tick("MNQ", tick(dec!(98), dec!(1))).await;

        let bar = store.forming_bar("MNQ").await.unwrap();
        assert_eq!(bar.high, dec!(105));
        assert_eq!(bar.low, dec!(98));
        assert_eq!(bar.close, dec!(98));
        assert_eq!(bar.volume, dec!(4));
    }

    #[tokio::test]
    async fn historical_bars_preserve_oldest_first_order() {
        let store = MarketStore::new(10, 10);
        let bars: Vec<Bar> = (0..3)
            .map(|i| Bar {
                timestamp: Utc::now(),
                open: Decimal::from(i),
                high: Decimal::from(i),
                low: Decimal::from(i),
                close: Decimal::from(i),
                volume: Decimal::ZERO,
                complete: true,
            })
            .collect();
        store.seed_historical_bars("MNQ", bars).await;
        let stored = store.completed_bars("MNQ").await;
        assert_eq!(stored[0].close, Decimal::from(0));
        assert_eq!(stored[2].close, Decimal::from(2));
    }
}
