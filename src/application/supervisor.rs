//! Wires every collaborator into a running system: broker session
//! lifecycle, subscriptions, history seeding, and the cooperating loops
//! that turn market/sentiment data into `TradeIntent`s and orders.
//! Construction (`build`) and network startup (`start`) are kept as
//! two distinct phases so tests can wire a mock broker without ever
//! touching a socket.

use crate::application::aggregator::{Aggregator, AggregatorConfig};
use crate::application::collectors::forum::ForumCollector;
use crate::application::collectors::microblog::MicroBlogCollector;
use crate::application::collectors::news::NewsCollector;
use crate::application::decider::{Decider, DeciderConfig};
use crate::application::indicators::{IndicatorParams, Indicators};
use crate::application::market_store::MarketStore;
use crate::application::order_manager::{OrderManager, OrderManagerConfig};
use crate::application::risk_gate::{RiskGate, RiskGateConfig};
use crate::application::scorer::NoopScorer;
use crate::config::Config;
use crate::domain::ports::{BrokerPort, Clock, Collector, Journal, MarketEvent, Scorer, SystemClock, UserEvent};
use crate::domain::types::{Action, AggregatedSentiment, Observation, Symbol, TradeIntent};
use crate::infrastructure::broker::{TradovateBroker, TradovateConfig};
use crate::infrastructure::gemini::GeminiScorer;
use crate::infrastructure::http_client_factory::HttpClientFactory;
use crate::infrastructure::mock::MockBroker;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::journal::SqlJournal;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

const MAX_SCORING_BATCH: usize = 15;

pub struct Supervisor {
    config: Config,
    broker: Arc<dyn BrokerPort>,
    tradovate_stream: Option<Arc<TradovateBroker>>,
    market_store: Arc<MarketStore>,
    indicators: Mutex<HashMap<Symbol, Indicators>>,
    collectors: Vec<Arc<dyn Collector>>,
    aggregator: Aggregator,
    risk_gate: Arc<RiskGate>,
    decider_config: DeciderConfig,
    scorer: Arc<dyn Scorer + Send + Sync>,
    order_manager: Arc<OrderManager>,
    journal: Arc<dyn Journal>,
    clock: Arc<dyn Clock>,
    pub metrics: Metrics,
    latest_sentiment: RwLock<HashMap<Symbol, AggregatedSentiment>>,
    latest_signal: RwLock<HashMap<Symbol, (DateTime<Utc>, TradeIntent)>>,
}

impl Supervisor {
    /// Wire every collaborator without touching the network. Broker
    /// authentication and stream setup happen in `start`.
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let mut tradovate_stream: Option<Arc<TradovateBroker>> = None;
        let broker: Arc<dyn BrokerPort> = if config.has_broker_credentials() {
            let tradovate_config = TradovateConfig {
                base_url: config.broker_base_url.clone(),
                ws_url: config.broker_ws_url.clone(),
                username: config.tradovate_username.clone(),
                password: config.tradovate_password.clone(),
                app_id: config.tradovate_app_id.clone(),
                cid: config.tradovate_cid.clone(),
                secret: config.tradovate_secret.clone(),
                heartbeat_seconds: config.heartbeat_seconds,
            };
            let concrete = Arc::new(TradovateBroker::new(tradovate_config));
            tradovate_stream = Some(Arc::clone(&concrete));
            concrete
        } else {
            info!("no broker credentials configured, using in-memory mock broker");
            Arc::new(MockBroker::new())
        };

        let market_store = MarketStore::new(config.tick_ring_capacity, config.bar_ring_capacity);

        let http_client = HttpClientFactory::create_client();
        let mut collectors: Vec<Arc<dyn Collector>> = Vec::new();
        collectors.push(Arc::new(MicroBlogCollector::new(http_client.clone(), config.micro_blog_bearer_token.clone())));
        collectors.push(Arc::new(ForumCollector::new(http_client.clone(), config.forum_enabled(), config.forum_user_agent.clone())));
        collectors.push(Arc::new(NewsCollector::new(http_client, config.news_api_key.clone(), config.alpha_vantage_api_key.clone())));

        let aggregator = Aggregator::new(
            AggregatorConfig {
                micro_blog_weight: config.micro_blog_weight,
                forum_weight: config.forum_weight,
                news_weight: config.news_weight,
                half_life_minutes: 30.0,
                window_minutes: 60,
                confidence_threshold: config.confidence_threshold,
            },
            Arc::clone(&clock),
        );

        let risk_gate = Arc::new(RiskGate::new(
            RiskGateConfig {
                max_daily_loss: config.max_daily_loss,
                max_trades_per_day: config.max_trades_per_day,
                account_size: config.account_size,
                risk_pct: config.risk_pct,
                max_position_size: config.max_position_size,
                stop_multiplier: config.stop_atr_multiplier,
                target_multiplier: config.target_atr_multiplier,
            },
            Arc::clone(&clock),
        ));

        let scorer: Arc<dyn Scorer + Send + Sync> = match &config.gemini_api_key {
            Some(key) => Arc::new(GeminiScorer::new(key.clone())),
            None => Arc::new(NoopScorer),
        };

        let order_manager = Arc::new(OrderManager::new(
            Arc::clone(&broker),
            Arc::clone(&risk_gate),
            Arc::clone(&clock),
            OrderManagerConfig {
                max_position_size: config.max_position_size,
                cooldown_seconds: config.cooldown_seconds as i64,
            },
        ));

        let journal: Arc<dyn Journal> = Arc::new(SqlJournal::new(&config.database_url).await?);

        let mut indicators = HashMap::new();
        for symbol in &config.default_symbols {
            indicators.insert(
                symbol.clone(),
                Indicators::new(IndicatorParams {
                    fast_period: config.fast_period,
                    slow_period: config.slow_period,
                    atr_period: config.atr_period,
                    rsi_period: config.rsi_period,
                }),
            );
        }

        Ok(Arc::new(Supervisor {
            decider_config: DeciderConfig {
                use_technicals: true,
                use_sentiment: config.news_enabled() || config.micro_blog_enabled() || config.forum_enabled(),
                use_llm_adjudication: config.scorer_enabled(),
                confidence_threshold: config.confidence_threshold,
            },
            config,
            broker,
            tradovate_stream,
            market_store,
            indicators: Mutex::new(indicators),
            collectors,
            aggregator,
            risk_gate,
            scorer,
            order_manager,
            journal,
            clock,
            metrics: Metrics::new()?,
            latest_sentiment: RwLock::new(HashMap::new()),
            latest_signal: RwLock::new(HashMap::new()),
        }))
    }

    /// Authenticate, subscribe every configured symbol, seed recent
    /// history, and spawn the cooperating background loops.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.broker.connect().await?;

        if let Some(tradovate) = &self.tradovate_stream {
            tradovate.start_stream().await?;
        }

        for symbol in &self.config.default_symbols {
            self.broker.subscribe_quote(symbol).await?;
            self.broker.subscribe_bar(symbol, self.config.bar_interval_minutes).await?;

            let now = self.clock.now();
            let from = now - chrono::Duration::hours(24);
            match self.broker.get_historical_bars(symbol, self.config.bar_interval_minutes, from, now).await {
                Ok(bars) if !bars.is_empty() => {
                    let closes: Vec<_> = bars.iter().map(|b| b.close).collect();
                    let highs: Vec<_> = bars.iter().map(|b| b.high).collect();
                    let lows: Vec<_> = bars.iter().map(|b| b.low).collect();
                    if let Some(ind) = self.indicators.lock().await.get_mut(symbol) {
                        ind.seed_from_history(&closes, &highs, &lows);
                    }
                    self.market_store.seed_historical_bars(symbol, bars).await;
                }
                Ok(_) => {}
                Err(e) => warn!(symbol, error = %e, "failed to seed historical bars"),
            }
        }

        self.spawn_market_event_loop();
        self.spawn_user_event_loop();
        for symbol in self.config.default_symbols.clone() {
            self.spawn_decision_loop(symbol);
        }
        self.spawn_sentiment_loop();
        self.spawn_heartbeat_loop();

        info!(symbols = ?self.config.default_symbols, "supervisor started");
        Ok(())
    }

    /// Owns every mutation of `MarketStore` and `Indicators` (§3
    /// Ownership): a completed bar is folded into the indicator engine
    /// here, on the stream-handling path, rather than by the polling
    /// decision task that only reads the resulting signal.
    fn spawn_market_event_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = this.broker.market_events();
            while let Some(event) = rx.recv().await {
                match event {
                    MarketEvent::QuoteUpdate(quotes) => {
                        for quote in quotes {
                            this.market_store.update_quote(quote).await;
                        }
                    }
                    MarketEvent::BarUpdate { symbol, bar } => {
                        this.market_store.apply_bar(&symbol, bar).await;
                        if bar.complete {
                            let mut indicators = this.indicators.lock().await;
                            let ind = indicators.entry(symbol.clone()).or_insert_with(|| {
                                Indicators::new(IndicatorParams {
                                    fast_period: this.config.fast_period,
                                    slow_period: this.config.slow_period,
                                    atr_period: this.config.atr_period,
                                    rsi_period: this.config.rsi_period,
                                })
                            });
                            ind.update(bar.close, bar.high, bar.low);
                        }
                    }
                    MarketEvent::TickUpdate { symbol, tick } => {
                        this.market_store.apply_tick(&symbol, tick).await;
                    }
                    MarketEvent::DomUpdate { .. } => {}
                }
            }
            warn!("market event stream ended");
        });
    }

    fn spawn_user_event_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = this.broker.user_events();
            while let Some(event) = rx.recv().await {
                match event {
                    UserEvent::FillEvent(fill) => this.order_manager.on_fill(&fill),
                    UserEvent::PositionUpdate(update) => this.order_manager.on_position_update(&update),
                    UserEvent::OrderUpdate(_) => {}
                }
            }
            warn!("user event stream ended");
        });
    }

    /// One task per symbol, ticking at 1 Hz (§2, §5): reads the current
    /// indicator snapshot and the latest cached sentiment — never
    /// mutates either, that happens on the stream-handling path — fuses
    /// them through the Decider, and places a bracket on a non-HOLD
    /// intent.
    fn spawn_decision_loop(self: &Arc<Self>, symbol: Symbol) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            loop {
                interval.tick().await;

                let signal = match this.indicators.lock().await.get(&symbol) {
                    Some(ind) => ind.signal(),
                    None => continue,
                };
                let Some(price_decimal) = this.market_store.latest_price(&symbol).await else {
                    continue;
                };
                let price = price_decimal.to_f64().unwrap_or(0.0);

                let sentiment = this.latest_sentiment.read().await.get(&symbol).cloned();

                let decider = Decider::new(this.decider_config, &this.risk_gate, Some(this.scorer.as_ref()));
                let intent = decider
                    .decide(&symbol, signal.signal, sentiment.as_ref(), signal.atr, Some(price), None)
                    .await;

                this.metrics.record_signal(&intent.action.to_string());
                this.latest_signal.write().await.insert(symbol.clone(), (this.clock.now(), intent.clone()));

                if intent.action == Action::Hold || intent.qty == 0 {
                    continue;
                }

                let long = intent.action == Action::Buy;
                let stop_distance = intent.risk.stop_distance.to_f64().unwrap_or(0.0);
                let target_distance = intent.risk.target_distance.to_f64().unwrap_or(0.0);
                let (stop_price, take_profit) = if long {
                    (price - stop_distance, price + target_distance)
                } else {
                    (price + stop_distance, price - target_distance)
                };

                let stop_decimal = rust_decimal::Decimal::try_from(stop_price).unwrap_or(price_decimal);
                let target_decimal = rust_decimal::Decimal::try_from(take_profit).unwrap_or(price_decimal);

                if let Some(order) = this
                    .order_manager
                    .place_bracket(&symbol, intent.action, intent.qty, stop_decimal, target_decimal)
                    .await
                {
                    let trade = crate::domain::types::TradeRecord {
                        id: None,
                        symbol: symbol.clone(),
                        action: intent.action,
                        qty: intent.qty,
                        entry_price: price_decimal,
                        stop_price: stop_decimal,
                        target_price: target_decimal,
                        confidence: intent.confidence,
                        sentiment_score: intent.sentiment_score,
                        reasoning: intent.reasoning.clone(),
                        opened_at: this.clock.now(),
                        exit_price: None,
                        realized_pnl: None,
                        closed_at: None,
                    };
                    if let Err(e) = this.journal.record_trade(&trade).await {
                        error!(symbol, error = %e, "failed to record trade");
                    }
                    info!(symbol, order_id = order.order_id, action = %intent.action, qty = intent.qty, "bracket placed");
                }
            }
        });
    }

    /// Refreshes per-symbol sentiment every 60s by fanning the
    /// configured Collectors out concurrently, batching the results
    /// through the Scorer at most `MAX_SCORING_BATCH` texts per call,
    /// then folding everything through the Aggregator.
    fn spawn_sentiment_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                for symbol in this.config.default_symbols.clone() {
                    this.refresh_sentiment(&symbol).await;
                }
            }
        });
    }

    async fn refresh_sentiment(&self, symbol: &str) {
        let futures = self.collectors.iter().map(|c| {
            let symbol = symbol.to_string();
            let collector = Arc::clone(c);
            async move {
                if collector.initialize().await {
                    collector.collect(&symbol, 25).await
                } else {
                    Vec::new()
                }
            }
        });
        let results: Vec<Vec<Observation>> = futures_util::future::join_all(futures).await;
        let observations: Vec<Observation> = results.into_iter().flatten().collect();

        if observations.is_empty() {
            return;
        }

        let mut seen: HashMap<String, (String, String)> = HashMap::new();
        for obs in &observations {
            seen.entry(obs.sentiment_key()).or_insert_with(|| (obs.text.clone(), obs.source.to_string()));
        }

        let keys: Vec<String> = seen.keys().cloned().collect();
        let mut scores: HashMap<String, crate::domain::types::SentimentResult> = HashMap::new();
        for chunk in keys.chunks(MAX_SCORING_BATCH) {
            let texts: Vec<String> = chunk.iter().map(|k| seen[k].0.clone()).collect();
            let sources: Vec<String> = chunk.iter().map(|k| seen[k].1.clone()).collect();
            let result = self.scorer.analyze(&texts, symbol, &sources).await;
            for key in chunk {
                scores.insert(key.clone(), result.clone());
            }
        }

        let aggregated = self.aggregator.aggregate(&symbol.to_string(), &observations, &scores);
        if let Err(e) = self.journal.record_sentiment(&aggregated).await {
            warn!(symbol, error = %e, "failed to record sentiment");
        }
        self.latest_sentiment.write().await.insert(symbol.to_string(), aggregated);
    }

    fn spawn_heartbeat_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(this.config.heartbeat_seconds));
            loop {
                interval.tick().await;
                let snapshot = this.risk_gate.snapshot();
                info!(
                    daily_pnl = %snapshot.daily_pnl,
                    daily_trades = snapshot.daily_trades,
                    killed = snapshot.killed,
                    "heartbeat"
                );
            }
        });
    }

    /// Cancel every working order across the symbol universe and close
    /// the broker session. Teardown order: collectors stop naturally
    /// (background loops exit with the process), order manager drains
    /// last so no order is left dangling.
    pub async fn shutdown(&self) -> Result<()> {
        self.order_manager.cancel_all(None).await;
        self.broker.disconnect().await?;
        Ok(())
    }

    pub async fn latest_signal(&self, symbol: &str) -> Option<TradeIntent> {
        self.latest_signal.read().await.get(symbol).map(|(_, intent)| intent.clone())
    }

    pub fn risk_gate(&self) -> &Arc<RiskGate> {
        &self.risk_gate
    }

    pub fn order_manager(&self) -> &Arc<OrderManager> {
        &self.order_manager
    }

    pub fn collectors_enabled(&self) -> (bool, bool, bool, bool) {
        (self.config.micro_blog_enabled(), self.config.forum_enabled(), self.config.news_enabled(), self.config.scorer_enabled())
    }
}
