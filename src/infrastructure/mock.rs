//! Deterministic in-memory `BrokerPort` used by `--demo` mode. Accepts
//! every order immediately, fills it at the requested (or a synthetic)
//! price, and never emits stream events on its own — a demo run drives
//! indicators purely from `get_historical_bars` seeding plus whatever
//! the caller feeds through `push_market_event`/`push_user_event`.

use crate::domain::ports::{BracketRequest, BrokerPort, MarketEvent, OrderRequest, UserEvent};
use crate::domain::types::{Balance, Bar, Order, OrderStatus, OrderType, PositionUpdate};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::info;

pub struct MockBroker {
    next_order_id: AtomicI64,
    market_tx: Sender<MarketEvent>,
    market_rx: Mutex<Option<Receiver<MarketEvent>>>,
    user_tx: Sender<UserEvent>,
    user_rx: Mutex<Option<Receiver<UserEvent>>>,
}

impl MockBroker {
    pub fn new() -> Self {
        let (market_tx, market_rx) = mpsc::channel(1024);
        let (user_tx, user_rx) = mpsc::channel(1024);
        MockBroker {
            next_order_id: AtomicI64::new(1),
            market_tx,
            market_rx: Mutex::new(Some(market_rx)),
            user_tx,
            user_rx: Mutex::new(Some(user_rx)),
        }
    }

    /// Feed a synthetic market event as if it had arrived on the stream.
    pub async fn push_market_event(&self, event: MarketEvent) {
        let _ = self.market_tx.send(event).await;
    }

    /// Feed a synthetic user event (fill/position/order update).
    pub async fn push_user_event(&self, event: UserEvent) {
        let _ = self.user_tx.send(event).await;
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerPort for MockBroker {
    async fn connect(&self) -> Result<()> {
        info!("mock broker connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn place_order(&self, req: OrderRequest) -> Result<Order> {
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let fill_price = req.price.or(req.stop_price).unwrap_or(Decimal::ZERO);
        let order = Order {
            order_id,
            symbol: req.symbol,
            action: req.action,
            qty: Decimal::from(req.qty),
            order_type: req.order_type,
            status: OrderStatus::Working,
            price: req.price,
            stop_price: req.stop_price,
            fill_price: Some(fill_price),
            filled_qty: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        info!(order_id, symbol = %order.symbol, "mock broker accepted order");
        Ok(order)
    }

    async fn place_bracket(&self, req: BracketRequest) -> Result<Order> {
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let order = Order {
            order_id,
            symbol: req.symbol,
            action: req.action,
            qty: Decimal::from(req.qty),
            order_type: OrderType::Bracket,
            status: OrderStatus::Working,
            price: None,
            stop_price: Some(req.stop_loss),
            fill_price: None,
            filled_qty: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        info!(order_id, symbol = %order.symbol, stop = %req.stop_loss, target = %req.take_profit, "mock broker accepted bracket");
        Ok(order)
    }

    async fn cancel_order(&self, order_id: i64) -> Result<()> {
        info!(order_id, "mock broker cancelled order");
        Ok(())
    }

    async fn modify_order(
        &self,
        _order_id: i64,
        _price: Option<Decimal>,
        _stop_price: Option<Decimal>,
    ) -> Result<()> {
        Ok(())
    }

    async fn liquidate(&self, symbol: &str) -> Result<()> {
        info!(symbol, "mock broker liquidated position");
        Ok(())
    }

    async fn get_positions(&self) -> Result<Vec<PositionUpdate>> {
        Ok(Vec::new())
    }

    async fn get_orders(&self) -> Result<Vec<Order>> {
        Ok(Vec::new())
    }

    async fn get_balance(&self) -> Result<Balance> {
        Ok(Balance {
            account_id: "demo".to_string(),
            cash_balance: Decimal::from(50_000),
            timestamp: Utc::now(),
        })
    }

    async fn get_historical_bars(
        &self,
        _symbol: &str,
        _interval_minutes: u32,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        Ok(Vec::new())
    }

    async fn subscribe_quote(&self, symbol: &str) -> Result<()> {
        info!(symbol, "mock broker subscribed quote");
        Ok(())
    }

    async fn subscribe_bar(&self, symbol: &str, interval_minutes: u32) -> Result<()> {
        info!(symbol, interval_minutes, "mock broker subscribed bar");
        Ok(())
    }

    fn market_events(&self) -> Receiver<MarketEvent> {
        self.market_rx
            .lock()
            .unwrap()
            .take()
            .expect("market_events() called more than once")
    }

    fn user_events(&self) -> Receiver<UserEvent> {
        self.user_rx
            .lock()
            .unwrap()
            .take()
            .expect("user_events() called more than once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Action;

    #[tokio::test]
    async fn place_order_returns_working_order_with_an_id() {
        let broker = MockBroker::new();
        let order = broker
            .place_order(OrderRequest {
                symbol: "MNQ".to_string(),
                action: Action::Buy,
                qty: 1,
                order_type: OrderType::Market,
                price: None,
                stop_price: None,
            })
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Working);
        assert!(order.order_id > 0);
    }

    #[tokio::test]
    async fn market_events_can_only_be_taken_once() {
        let broker = MockBroker::new();
        let _rx = broker.market_events();
    }

    #[tokio::test]
    async fn pushed_market_event_is_observable_on_the_stream() {
        let broker = MockBroker::new();
        let mut rx = broker.market_events();
        broker
            .push_market_event(MarketEvent::QuoteUpdate(vec![]))
            .await;
        let event = rx.recv().await.unwrap();
        matches!(event, MarketEvent::QuoteUpdate(_));
    }
}
