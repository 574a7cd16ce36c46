//! Translates `TradeIntent`s into bracket orders, tracks positions and
//! working orders, and reacts to fills. One `OrderManager` instance guards
//! the whole symbol universe; per-symbol state is internally locked so
//! placement and the user-stream fill/position handlers can run from
//! different tasks (§5).

use crate::application::risk_gate::RiskGate;
use crate::domain::ports::{BrokerPort, Clock, OrderRequest, BracketRequest};
use crate::domain::types::{
    Action, FillEvent, Order, OrderStatus, OrderType, Position, PositionUpdate, Side, Symbol,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct OrderManagerConfig {
    pub max_position_size: u32,
    pub cooldown_seconds: i64,
}

struct SymbolState {
    position: Position,
    cooldown_until: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct OrderManager {
    broker: Arc<dyn BrokerPort>,
    risk_gate: Arc<RiskGate>,
    clock: Arc<dyn Clock>,
    config: OrderManagerConfig,
    symbols: Mutex<HashMap<Symbol, SymbolState>>,
    orders: Mutex<HashMap<i64, Order>>,
}

impl OrderManager {
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        risk_gate: Arc<RiskGate>,
        clock: Arc<dyn Clock>,
        config: OrderManagerConfig,
    ) -> Self {
        OrderManager {
            broker,
            risk_gate,
            clock,
            config,
            symbols: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
        }
    }

    fn symbol_state<'a>(
        &self,
        symbols: &'a mut HashMap<Symbol, SymbolState>,
        symbol: &str,
    ) -> &'a mut SymbolState {
        symbols.entry(symbol.to_string()).or_insert_with(|| SymbolState {
            position: Position::flat(self.clock.now()),
            cooldown_until: None,
        })
    }

    fn in_cooldown(&self, symbol: &str) -> bool {
        let symbols = self.symbols.lock().unwrap();
        match symbols.get(symbol).and_then(|s| s.cooldown_until) {
            Some(until) => self.clock.now() < until,
            None => false,
        }
    }

    fn start_cooldown(&self, symbol: &str) {
        let mut symbols = self.symbols.lock().unwrap();
        let state = self.symbol_state(&mut symbols, symbol);
        state.cooldown_until =
            Some(self.clock.now() + chrono::Duration::seconds(self.config.cooldown_seconds));
    }

    pub fn position(&self, symbol: &str) -> Position {
        let mut symbols = self.symbols.lock().unwrap();
        self.symbol_state(&mut symbols, symbol).position
    }

    /// Market-order entry, gated by `RiskGate::canTrade()`. Returns
    /// `None` on refusal (non-fatal, §4.9).
    pub async fn place_market(&self, symbol: &str, action: Action, qty: u32) -> Option<Order> {
        let (allowed, reason) = self.risk_gate.can_trade();
        if !allowed {
            info!(symbol, reason, "order refused by risk gate");
            return None;
        }
        if self.in_cooldown(symbol) {
            info!(symbol, "order suppressed: symbol in cooldown");
            return None;
        }
        let qty = qty.min(self.config.max_position_size);
        let req = OrderRequest {
            symbol: symbol.to_string(),
            action,
            qty,
            order_type: OrderType::Market,
            price: None,
            stop_price: None,
        };
        self.submit(symbol, self.broker.place_order(req)).await
    }

    pub async fn place_limit(&self, symbol: &str, action: Action, qty: u32, price: Decimal) -> Option<Order> {
        let (allowed, reason) = self.risk_gate.can_trade();
        if !allowed {
            info!(symbol, reason, "order refused by risk gate");
            return None;
        }
        if self.in_cooldown(symbol) {
            return None;
        }
        let qty = qty.min(self.config.max_position_size);
        let req = OrderRequest {
            symbol: symbol.to_string(),
            action,
            qty,
            order_type: OrderType::Limit,
            price: Some(price),
            stop_price: None,
        };
        self.submit(symbol, self.broker.place_order(req)).await
    }

    pub async fn place_stop(&self, symbol: &str, action: Action, qty: u32, stop_price: Decimal) -> Option<Order> {
        let (allowed, reason) = self.risk_gate.can_trade();
        if !allowed {
            info!(symbol, reason, "order refused by risk gate");
            return None;
        }
        if self.in_cooldown(symbol) {
            return None;
        }
        let qty = qty.min(self.config.max_position_size);
        let req = OrderRequest {
            symbol: symbol.to_string(),
            action,
            qty,
            order_type: OrderType::Stop,
            price: None,
            stop_price: Some(stop_price),
        };
        self.submit(symbol, self.broker.place_order(req)).await
    }

    /// Entry + OSO stop-loss/take-profit bracket (§4.9). If the symbol
    /// currently holds a position opposite the requested action, it is
    /// flattened first; the cooldown timer still applies after the
    /// flatten (§4.9 Reversal).
    pub async fn place_bracket(
        &self,
        symbol: &str,
        action: Action,
        qty: u32,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Option<Order> {
        let (allowed, reason) = self.risk_gate.can_trade();
        if !allowed {
            info!(symbol, reason, "bracket refused by risk gate");
            return None;
        }
        if self.in_cooldown(symbol) {
            info!(symbol, "bracket suppressed: symbol in cooldown");
            return None;
        }

        let current = self.position(symbol);
        let opposing = match (current.side, action) {
            (Side::Long, Action::Sell) => true,
            (Side::Short, Action::Buy) => true,
            _ => false,
        };
        if opposing {
            info!(symbol, "reversal: flattening existing position before reopening");
            self.flatten(symbol).await;
        }

        let qty = qty.min(self.config.max_position_size);
        let req = BracketRequest {
            symbol: symbol.to_string(),
            action,
            qty,
            stop_loss,
            take_profit,
        };
        self.submit(symbol, self.broker.place_bracket(req)).await
    }

    async fn submit(
        &self,
        symbol: &str,
        fut: impl std::future::Future<Output = anyhow::Result<Order>>,
    ) -> Option<Order> {
        match fut.await {
            Ok(order) => {
                self.orders.lock().unwrap().insert(order.order_id, order.clone());
                self.start_cooldown(symbol);
                Some(order)
            }
            Err(e) => {
                warn!(symbol, error = %e, "order placement rejected");
                None
            }
        }
    }

    pub async fn cancel_order(&self, order_id: i64) -> anyhow::Result<()> {
        self.broker.cancel_order(order_id).await?;
        if let Some(order) = self.orders.lock().unwrap().get_mut(&order_id) {
            order.status = OrderStatus::Cancelled;
        }
        Ok(())
    }

    /// Cancel every working order, optionally scoped to one symbol.
    pub async fn cancel_all(&self, symbol: Option<&str>) {
        let working: Vec<i64> = {
            let orders = self.orders.lock().unwrap();
            orders
                .values()
                .filter(|o| o.status == OrderStatus::Working || o.status == OrderStatus::Pending)
                .filter(|o| symbol.map(|s| s == o.symbol).unwrap_or(true))
                .map(|o| o.order_id)
                .collect()
        };
        for id in working {
            if let Err(e) = self.cancel_order(id).await {
                warn!(order_id = id, error = %e, "failed to cancel order during cancel_all");
            }
        }
    }

    /// Flatten an open position via `BrokerPort::liquidate`; starts the
    /// cooldown timer even if already flat (§4.9).
    pub async fn flatten(&self, symbol: &str) {
        let current = self.position(symbol);
        if current.side != Side::Flat {
            if let Err(e) = self.broker.liquidate(symbol).await {
                warn!(symbol, error = %e, "liquidate failed");
                return;
            }
            let mut symbols = self.symbols.lock().unwrap();
            let state = self.symbol_state(&mut symbols, symbol);
            state.position = Position::flat(self.clock.now());
        }
        self.start_cooldown(symbol);
    }

    pub async fn flatten_all(&self, symbols: &[Symbol]) {
        for symbol in symbols {
            self.flatten(symbol).await;
        }
    }

    /// Rehydrate positions/orders from the broker (e.g. on (re)connect).
    pub async fn sync_positions(&self) -> anyhow::Result<()> {
        let now = self.clock.now();
        let positions = self.broker.get_positions().await?;
        let mut symbols = self.symbols.lock().unwrap();
        for update in positions {
            let state = self.symbol_state(&mut symbols, &update.symbol);
            state.position = Position::from_net(update.net_pos, update.net_price, now);
        }
        drop(symbols);

        let orders = self.broker.get_orders().await?;
        let mut guard = self.orders.lock().unwrap();
        for order in orders {
            guard.insert(order.order_id, order);
        }
        Ok(())
    }

    /// Fill handler (§4.9): updates the matching order's `filled_qty`/
    /// `fill_price`; transitions to `Filled` once `filled_qty >= qty`.
    pub fn on_fill(&self, fill: &FillEvent) {
        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.get_mut(&fill.order_id) {
            order.apply_fill(fill.price, fill.qty);
        }
    }

    /// Position handler (§4.9): `net_pos → (side, qty)` mapping.
    pub fn on_position_update(&self, update: &PositionUpdate) {
        let mut symbols = self.symbols.lock().unwrap();
        let state = self.symbol_state(&mut symbols, &update.symbol);
        state.position = Position::from_net(update.net_pos, update.net_price, update.timestamp);
    }

    pub fn order(&self, order_id: i64) -> Option<Order> {
        self.orders.lock().unwrap().get(&order_id).cloned()
    }
}
