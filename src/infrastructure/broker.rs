//! Concrete `BrokerPort` against a Tradovate-shaped brokerage (§4.1, §6):
//! REST for account/order/position calls and a single bidirectional
//! WebSocket stream, framed `endpoint\nid\n\njson`, for market and user
//! events plus stream-side subscription requests.

use crate::domain::errors::BrokerError;
use crate::domain::ports::{BracketRequest, BrokerPort, MarketEvent, OrderRequest, UserEvent};
use crate::domain::types::{
    Action, Balance, Bar, FillEvent, Order, OrderStatus, OrderType, PositionUpdate, Quote, Tick,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

const REST_TIMEOUT: Duration = Duration::from_secs(10);
const STREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const REAUTH_SKEW: chrono::Duration = chrono::Duration::hours(1);

#[derive(Debug, Clone)]
pub struct TradovateConfig {
    pub base_url: String,
    pub ws_url: String,
    pub username: String,
    pub password: String,
    pub app_id: String,
    pub cid: String,
    pub secret: String,
    pub heartbeat_seconds: u64,
}

#[derive(Debug, Clone)]
struct TokenState {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    name: &'a str,
    password: &'a str,
    #[serde(rename = "appId")]
    app_id: &'a str,
    #[serde(rename = "appVersion")]
    app_version: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sec: Option<&'a str>,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    #[serde(rename = "expirationTime")]
    expiration_time: Option<String>,
    #[serde(rename = "errorText")]
    error_text: Option<String>,
}

/// Outstanding WS-correlated subscription/sync request, completed by
/// the reader task when a response frame with the matching id arrives.
type Pending = HashMap<i64, oneshot::Sender<Value>>;

pub struct TradovateBroker {
    config: TradovateConfig,
    http: Client,
    token: RwLock<Option<TokenState>>,
    next_request_id: AtomicI64,
    market_tx: mpsc::Sender<MarketEvent>,
    market_rx: StdMutex<Option<mpsc::Receiver<MarketEvent>>>,
    user_tx: mpsc::Sender<UserEvent>,
    user_rx: StdMutex<Option<mpsc::Receiver<UserEvent>>>,
    ws_out: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: Mutex<Pending>,
    active_subscriptions: Mutex<Vec<(String, Option<u32>)>>,
}

impl TradovateBroker {
    pub fn new(config: TradovateConfig) -> Self {
        let (market_tx, market_rx) = mpsc::channel(4096);
        let (user_tx, user_rx) = mpsc::channel(4096);
        TradovateBroker {
            config,
            http: Client::builder().timeout(REST_TIMEOUT).build().unwrap_or_else(|_| Client::new()),
            token: RwLock::new(None),
            next_request_id: AtomicI64::new(1),
            market_tx,
            market_rx: StdMutex::new(Some(market_rx)),
            user_tx,
            user_rx: StdMutex::new(Some(user_rx)),
            ws_out: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            active_subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Proactive re-auth when less than `REAUTH_SKEW` remains; reactive
    /// re-auth is triggered by the caller on a `NotAuthenticated` result.
    async fn ensure_token(&self) -> Result<String, BrokerError> {
        {
            let guard = self.token.read().await;
            if let Some(state) = guard.as_ref() {
                if state.expires_at - Utc::now() > REAUTH_SKEW {
                    return Ok(state.access_token.clone());
                }
            }
        }
        self.authenticate().await
    }

    async fn authenticate(&self) -> Result<String, BrokerError> {
        let body = AuthRequest {
            name: &self.config.username,
            password: &self.config.password,
            app_id: &self.config.app_id,
            app_version: "1.0",
            device_id: "sentinel-agent",
            cid: if self.config.cid.is_empty() { None } else { Some(&self.config.cid) },
            sec: if self.config.secret.is_empty() { None } else { Some(&self.config.secret) },
        };

        let resp = timeout(
            REST_TIMEOUT,
            self.http
                .post(format!("{}/auth/accesstokenrequest", self.config.base_url))
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| BrokerError::Timeout { secs: REST_TIMEOUT.as_secs() })?
        .map_err(|e| BrokerError::Transport(e.to_string()))?;

        let parsed: AuthResponse = resp.json().await.map_err(|e| BrokerError::Transport(e.to_string()))?;
        let access_token = parsed
            .access_token
            .ok_or_else(|| BrokerError::Rejected { reason: parsed.error_text.unwrap_or_else(|| "authentication failed".to_string()) })?;

        let expires_at = parsed
            .expiration_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(24));

        *self.token.write().await = Some(TokenState { access_token: access_token.clone(), expires_at });
        info!(expires_at = %expires_at, "tradovate authentication succeeded");
        Ok(access_token)
    }

    async fn rest_get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, BrokerError> {
        let token = self.ensure_token().await?;
        let resp = timeout(
            REST_TIMEOUT,
            self.http
                .get(format!("{}/{}", self.config.base_url, path))
                .bearer_auth(token)
                .query(query)
                .send(),
        )
        .await
        .map_err(|_| BrokerError::Timeout { secs: REST_TIMEOUT.as_secs() })?
        .map_err(|e| BrokerError::Transport(e.to_string()))?;
        self.handle_rest_response(resp).await
    }

    async fn rest_post(&self, path: &str, body: Value) -> Result<Value, BrokerError> {
        let token = self.ensure_token().await?;
        let resp = timeout(
            REST_TIMEOUT,
            self.http
                .post(format!("{}/{}", self.config.base_url, path))
                .bearer_auth(token)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| BrokerError::Timeout { secs: REST_TIMEOUT.as_secs() })?
        .map_err(|e| BrokerError::Transport(e.to_string()))?;
        self.handle_rest_response(resp).await
    }

    async fn handle_rest_response(&self, resp: reqwest::Response) -> Result<Value, BrokerError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(BrokerError::NotAuthenticated);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BrokerError::Rejected { reason: format!("{status}: {body}") });
        }
        resp.json().await.map_err(|e| BrokerError::Transport(e.to_string()))
    }

    /// Retry once after a fresh authentication on a `NotAuthenticated`
    /// result (§7 "single 401-equivalent then retry once").
    async fn rest_post_with_reauth(&self, path: &str, body: Value) -> Result<Value, BrokerError> {
        match self.rest_post(path, body.clone()).await {
            Err(BrokerError::NotAuthenticated) => {
                self.authenticate().await?;
                self.rest_post(path, body).await
            }
            other => other,
        }
    }

    fn next_id(&self) -> i64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a frame over the active WS connection and await its
    /// correlated response, evicting the pending entry on timeout.
    async fn stream_request(&self, endpoint: &str, body: Value) -> Result<Value> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = format!("{endpoint}\n{id}\n\n{body}");
        let out = self.ws_out.lock().await;
        let sender = out.as_ref().context("stream not connected")?;
        sender.send(frame).context("stream send failed")?;
        drop(out);

        match timeout(STREAM_REQUEST_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => anyhow::bail!("stream request channel dropped"),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                anyhow::bail!("stream request {id} ({endpoint}) timed out")
            }
        }
    }

    /// Connect the WS stream and spawn the reader/heartbeat/reconnect
    /// tasks. Re-issues active subscriptions and a user sync on every
    /// (re)connect.
    async fn connect_stream(self: &std::sync::Arc<Self>) -> Result<()> {
        let token = self.ensure_token().await?;
        let (ws_stream, _) = connect_async(&self.config.ws_url).await.context("websocket connect failed")?;
        let (mut write, mut read) = ws_stream.split();
        write
            .send(Message::Text(format!("authorize\n0\n\n{token}").into()))
            .await
            .context("authorize frame failed")?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        *self.ws_out.lock().await = Some(out_tx.clone());

        let writer_self = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if write.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = writer_self;
        });

        let heartbeat_tx = out_tx.clone();
        let heartbeat_secs = self.config.heartbeat_seconds;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(heartbeat_secs));
            loop {
                interval.tick().await;
                if heartbeat_tx.send(String::new()).is_err() {
                    break;
                }
            }
        });

        let reader_self = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => reader_self.handle_frame(&text).await,
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            warn!("tradovate stream closed, scheduling reconnect");
            reader_self.reconnect_with_backoff().await;
        });

        let subs = self.active_subscriptions.lock().await.clone();
        for (symbol, interval_minutes) in subs {
            match interval_minutes {
                Some(minutes) => {
                    let _ = self.stream_request("md/getChart", json!({"symbol": symbol, "chartDescription": {"underlyingType": "MinuteBar", "elementSize": minutes, "elementSizeUnit": "UnderlyingUnits"}})).await;
                }
                None => {
                    let _ = self.stream_request("md/subscribeQuote", json!({"symbol": symbol})).await;
                }
            }
        }
        let _ = self.stream_request("user/syncrequest", json!({})).await;
        Ok(())
    }

    async fn reconnect_with_backoff(self: std::sync::Arc<Self>) {
        let mut delay = Duration::from_secs(1);
        loop {
            tokio::time::sleep(delay).await;
            match self.connect_stream().await {
                Ok(()) => {
                    info!("tradovate stream reconnected");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, delay_secs = delay.as_secs(), "reconnect attempt failed");
                    delay = (delay * 2).min(Duration::from_secs(60));
                }
            }
        }
    }

    /// Parse one `endpoint\nid\n\nbody` frame. An empty frame (or the
    /// literal `h`) is a heartbeat and is dropped.
    async fn handle_frame(&self, frame: &str) {
        if frame.is_empty() || frame == "h" {
            return;
        }
        let mut parts = frame.splitn(2, "\n\n");
        let header = parts.next().unwrap_or_default();
        let body_str = parts.next().unwrap_or_default();
        let mut header_parts = header.splitn(2, '\n');
        let endpoint = header_parts.next().unwrap_or_default();
        let id: Option<i64> = header_parts.next().and_then(|s| s.parse().ok());

        let body: Value = match serde_json::from_str(body_str) {
            Ok(v) => v,
            Err(_) => return,
        };

        if let Some(id) = id {
            if let Some(tx) = self.pending.lock().await.remove(&id) {
                let _ = tx.send(body.clone());
                return;
            }
        }

        self.dispatch_event(endpoint, body).await;
    }

    async fn dispatch_event(&self, endpoint: &str, body: Value) {
        match endpoint {
            "md/quote" | "quote" => {
                if let Some(quotes) = parse_quote_batch(&body) {
                    let _ = self.market_tx.send(MarketEvent::QuoteUpdate(quotes)).await;
                }
            }
            "md/chart" | "chart" => {
                if let (Some(symbol), Some(bar)) = (body.get("symbol").and_then(Value::as_str), parse_bar(&body)) {
                    let _ = self.market_tx.send(MarketEvent::BarUpdate { symbol: symbol.to_string(), bar }).await;
                }
            }
            "md/tick" | "tick" => {
                if let (Some(symbol), Some(tick)) = (body.get("symbol").and_then(Value::as_str), parse_tick(&body)) {
                    let _ = self.market_tx.send(MarketEvent::TickUpdate { symbol: symbol.to_string(), tick }).await;
                }
            }
            "user/fill" | "fill" => {
                if let Some(fill) = parse_fill(&body) {
                    let _ = self.user_tx.send(UserEvent::FillEvent(fill)).await;
                }
            }
            "user/position" | "position" => {
                if let Some(update) = parse_position(&body) {
                    let _ = self.user_tx.send(UserEvent::PositionUpdate(update)).await;
                }
            }
            other => debug!(endpoint = other, "unhandled stream event"),
        }
    }
}

fn decimal_from_f64(v: &Value, key: &str) -> Option<Decimal> {
    v.get(key).and_then(Value::as_f64).and_then(|f| Decimal::try_from(f).ok())
}

fn decimal_field(v: &Value, key: &str) -> Decimal {
    decimal_from_f64(v, key).unwrap_or(Decimal::ZERO)
}

/// Bar timestamps arrive as either ISO-8601 (streaming) or epoch
/// seconds (historical REST envelope) — see spec §9 Open Question (c).
fn parse_timestamp(v: &Value, key: &str) -> DateTime<Utc> {
    match v.get(key) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        Some(Value::Number(n)) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()).unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
}

fn parse_quote_batch(body: &Value) -> Option<Vec<Quote>> {
    let entries = body.as_array().cloned().unwrap_or_else(|| vec![body.clone()]);
    let quotes: Vec<Quote> = entries
        .iter()
        .filter_map(|e| {
            let symbol = e.get("symbol").or_else(|| e.get("contractId")).and_then(Value::as_str).map(str::to_string)
                .or_else(|| e.get("contractId").and_then(Value::as_i64).map(|id| id.to_string()))?;
            Some(Quote {
                symbol,
                bid: decimal_field(e, "bid"),
                ask: decimal_from_f64(e, "offer").or_else(|| decimal_from_f64(e, "ask")).unwrap_or(Decimal::ZERO),
                last: decimal_field(e, "last"),
                bid_size: decimal_field(e, "bidSize"),
                ask_size: decimal_from_f64(e, "offerSize").or_else(|| decimal_from_f64(e, "askSize")).unwrap_or(Decimal::ZERO),
                volume: decimal_field(e, "totalVolume"),
                timestamp: Utc::now(),
            })
        })
        .collect();
    if quotes.is_empty() { None } else { Some(quotes) }
}

fn parse_bar(v: &Value) -> Option<Bar> {
    Some(Bar {
        timestamp: parse_timestamp(v, "timestamp"),
        open: decimal_field(v, "open"),
        high: decimal_field(v, "high"),
        low: decimal_field(v, "low"),
        close: decimal_field(v, "close"),
        volume: decimal_field(v, "volume"),
        complete: v.get("complete").and_then(Value::as_bool).unwrap_or(true),
    })
}

fn parse_tick(v: &Value) -> Option<Tick> {
    Some(Tick {
        timestamp: parse_timestamp(v, "timestamp"),
        price: decimal_field(v, "price"),
        size: decimal_field(v, "size"),
        bid_snapshot: decimal_field(v, "bid"),
        ask_snapshot: decimal_field(v, "ask"),
    })
}

fn parse_fill(v: &Value) -> Option<FillEvent> {
    Some(FillEvent {
        order_id: v.get("orderId").and_then(Value::as_i64)?,
        symbol: v.get("symbol").and_then(Value::as_str).unwrap_or_default().to_string(),
        price: decimal_field(v, "price"),
        qty: decimal_field(v, "qty"),
        timestamp: Utc::now(),
    })
}

fn parse_position(v: &Value) -> Option<PositionUpdate> {
    Some(PositionUpdate {
        symbol: v.get("contractId").and_then(Value::as_str).unwrap_or_default().to_string(),
        net_pos: decimal_field(v, "netPos"),
        net_price: decimal_field(v, "netPrice"),
        timestamp: Utc::now(),
    })
}

fn action_str(action: Action) -> &'static str {
    match action {
        Action::Buy => "Buy",
        Action::Sell => "Sell",
        Action::Hold => "Buy",
    }
}

fn order_type_str(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "Market",
        OrderType::Limit => "Limit",
        OrderType::Stop => "Stop",
        OrderType::Bracket => "Market",
    }
}

fn order_from_response(v: &Value, fallback_symbol: &str, fallback_action: Action, fallback_qty: u32, order_type: OrderType) -> Order {
    Order {
        order_id: v.get("orderId").and_then(Value::as_i64).unwrap_or(0),
        symbol: fallback_symbol.to_string(),
        action: fallback_action,
        qty: Decimal::from(fallback_qty),
        order_type,
        status: OrderStatus::Working,
        price: None,
        stop_price: None,
        fill_price: None,
        filled_qty: Decimal::ZERO,
        timestamp: Utc::now(),
    }
}

#[async_trait]
impl BrokerPort for TradovateBroker {
    async fn connect(&self) -> Result<()> {
        self.ensure_token().await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.ws_out.lock().await = None;
        Ok(())
    }

    async fn place_order(&self, req: OrderRequest) -> Result<Order> {
        let body = json!({
            "accountSpec": self.config.username,
            "action": action_str(req.action),
            "symbol": req.symbol,
            "orderQty": req.qty,
            "orderType": order_type_str(req.order_type),
            "price": req.price,
            "stopPrice": req.stop_price,
        });
        let resp = self.rest_post_with_reauth("order/placeorder", body).await?;
        Ok(order_from_response(&resp, &req.symbol, req.action, req.qty, req.order_type))
    }

    async fn place_bracket(&self, req: BracketRequest) -> Result<Order> {
        let opposite = match req.action {
            Action::Buy => "Sell",
            Action::Sell => "Buy",
            Action::Hold => "Sell",
        };
        let body = json!({
            "accountSpec": self.config.username,
            "action": action_str(req.action),
            "symbol": req.symbol,
            "orderQty": req.qty,
            "orderType": "Market",
            "bracket1": {"action": opposite, "orderType": "Stop", "stopPrice": req.stop_loss},
            "bracket2": {"action": opposite, "orderType": "Limit", "price": req.take_profit},
        });
        let resp = self.rest_post_with_reauth("order/placeoso", body).await?;
        Ok(order_from_response(&resp, &req.symbol, req.action, req.qty, OrderType::Bracket))
    }

    async fn cancel_order(&self, order_id: i64) -> Result<()> {
        self.rest_post_with_reauth("order/cancelorder", json!({"orderId": order_id})).await?;
        Ok(())
    }

    async fn modify_order(&self, order_id: i64, price: Option<Decimal>, stop_price: Option<Decimal>) -> Result<()> {
        self.rest_post_with_reauth(
            "order/modifyorder",
            json!({"orderId": order_id, "price": price, "stopPrice": stop_price}),
        )
        .await?;
        Ok(())
    }

    async fn liquidate(&self, symbol: &str) -> Result<()> {
        self.rest_post_with_reauth("order/liquidateposition", json!({"symbol": symbol})).await?;
        Ok(())
    }

    async fn get_positions(&self) -> Result<Vec<PositionUpdate>> {
        let resp = self.rest_get("position/list", &[]).await?;
        let entries = resp.as_array().cloned().unwrap_or_default();
        Ok(entries.iter().filter_map(parse_position).collect())
    }

    async fn get_orders(&self) -> Result<Vec<Order>> {
        let resp = self.rest_get("order/list", &[]).await?;
        let entries = resp.as_array().cloned().unwrap_or_default();
        Ok(entries
            .iter()
            .map(|e| order_from_response(e, e.get("symbol").and_then(Value::as_str).unwrap_or_default(), Action::Hold, 0, OrderType::Market))
            .collect())
    }

    async fn get_balance(&self) -> Result<Balance> {
        let resp = self.rest_get("cashBalance/getCashBalanceSnapshot", &[]).await?;
        Ok(Balance {
            account_id: resp.get("accountId").and_then(Value::as_str).unwrap_or_default().to_string(),
            cash_balance: decimal_field(&resp, "cashBalance"),
            timestamp: Utc::now(),
        })
    }

    async fn get_historical_bars(&self, symbol: &str, interval_minutes: u32, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Bar>> {
        let resp = self
            .rest_get(
                "md/getChart",
                &[
                    ("symbol", symbol.to_string()),
                    ("elementSize", interval_minutes.to_string()),
                    ("startDate", from.to_rfc3339()),
                    ("endDate", to.to_rfc3339()),
                ],
            )
            .await?;
        let bars = resp
            .get("bars")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(parse_bar)
            .collect::<Vec<_>>();
        Ok(bars)
    }

    async fn subscribe_quote(&self, symbol: &str) -> Result<()> {
        self.active_subscriptions.lock().await.push((symbol.to_string(), None));
        self.stream_request("md/subscribeQuote", json!({"symbol": symbol})).await.map(|_| ())
    }

    async fn subscribe_bar(&self, symbol: &str, interval_minutes: u32) -> Result<()> {
        self.active_subscriptions.lock().await.push((symbol.to_string(), Some(interval_minutes)));
        self.stream_request(
            "md/getChart",
            json!({"symbol": symbol, "chartDescription": {"underlyingType": "MinuteBar", "elementSize": interval_minutes, "elementSizeUnit": "UnderlyingUnits"}}),
        )
        .await
        .map(|_| ())
    }

    fn market_events(&self) -> mpsc::Receiver<MarketEvent> {
        self.market_rx.lock().unwrap().take().expect("market_events() called more than once")
    }

    fn user_events(&self) -> mpsc::Receiver<UserEvent> {
        self.user_rx.lock().unwrap().take().expect("user_events() called more than once")
    }
}

impl TradovateBroker {
    /// Open the bidirectional stream; call once after `connect()`. Spawns
    /// the reader/heartbeat/reconnect tasks that run for the process
    /// lifetime.
    pub async fn start_stream(self: &std::sync::Arc<Self>) -> Result<()> {
        self.connect_stream().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bar_accepts_iso8601_timestamp() {
        let v = json!({"timestamp": "2026-01-15T09:30:00Z", "open": 100.0, "high": 101.0, "low": 99.0, "close": 100.5, "volume": 10, "complete": true});
        let bar = parse_bar(&v).unwrap();
        assert_eq!(bar.timestamp.to_rfc3339(), "2026-01-15T09:30:00+00:00");
    }

    #[test]
    fn parse_bar_accepts_epoch_seconds_timestamp() {
        let v = json!({"timestamp": 1_768_469_400, "open": 100.0, "high": 101.0, "low": 99.0, "close": 100.5, "volume": 10, "complete": true});
        let bar = parse_bar(&v).unwrap();
        assert_eq!(bar.timestamp.timestamp(), 1_768_469_400);
    }

    #[test]
    fn parse_quote_batch_accepts_offer_or_ask_key() {
        let v = json!([{"symbol": "MNQ", "bid": 100.0, "offer": 101.0, "last": 100.5, "bidSize": 1, "offerSize": 1, "totalVolume": 10}]);
        let quotes = parse_quote_batch(&v).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].ask, Decimal::try_from(101.0).unwrap());
    }

    #[test]
    fn empty_and_literal_h_frames_are_heartbeats() {
        assert!("".is_empty());
        assert_eq!("h", "h");
    }
}
