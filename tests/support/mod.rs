//! Shared fixtures for the integration tests below: a `Config` with no
//! broker/collector credentials (forces the in-memory `MockBroker` and
//! disables every Collector) pointed at a throwaway SQLite file per test.

use rust_decimal::Decimal;
use sentinel_agent::config::Config;

pub fn test_config(symbol: &str) -> Config {
    let db_path = std::env::temp_dir().join(format!(
        "sentinel-agent-test-{}-{}.db",
        std::process::id(),
        rand::random::<u64>()
    ));

    Config {
        tradovate_username: String::new(),
        tradovate_password: String::new(),
        tradovate_app_id: String::new(),
        tradovate_cid: String::new(),
        tradovate_secret: String::new(),
        broker_base_url: "https://demo.tradovateapi.com/v1".to_string(),
        broker_ws_url: "wss://demo.tradovateapi.com/v1/websocket".to_string(),

        micro_blog_bearer_token: None,
        forum_client_id: None,
        forum_client_secret: None,
        forum_user_agent: "sentinel-agent-test/0.1".to_string(),
        news_api_key: None,
        alpha_vantage_api_key: None,

        gemini_api_key: None,

        server_host: "127.0.0.1".to_string(),
        server_port: 0,

        default_symbols: vec![symbol.to_string()],
        confidence_threshold: 0.55,
        max_daily_loss: Decimal::from(500),
        max_trades_per_day: 10,
        cooldown_seconds: 30,

        micro_blog_weight: 0.3,
        forum_weight: 0.3,
        news_weight: 0.4,

        fast_period: 9,
        slow_period: 21,
        atr_period: 14,
        rsi_period: 14,

        tick_ring_capacity: 10_000,
        bar_ring_capacity: 500,
        bar_interval_minutes: 5,

        account_size: Decimal::from(50_000),
        risk_pct: 1.0,
        max_position_size: 5,
        stop_atr_multiplier: 1.5,
        target_atr_multiplier: 2.0,

        heartbeat_seconds: 25,

        database_url: format!("sqlite://{}", db_path.display()),

        log_level: "info".to_string(),
        observability_enabled: false,
        observability_interval_seconds: 60,
    }
}
