//! Process-wide settings, loaded once from the environment (+ `.env`)
//! at startup and threaded explicitly through every constructor. Never
//! a global/lazy-static.

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::env;

/// Derived from presence of the `--demo`/`--live` CLI flag, not stored
/// in `Config` itself; kept here only as a shared vocabulary type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Demo,
    Live,
}

#[derive(Debug, Clone)]
pub struct Config {
    // --- Broker (Tradovate-shaped) credentials ---
    pub tradovate_username: String,
    pub tradovate_password: String,
    pub tradovate_app_id: String,
    pub tradovate_cid: String,
    pub tradovate_secret: String,
    pub broker_base_url: String,
    pub broker_ws_url: String,

    // --- Collector credentials (presence derives the enabled bool) ---
    pub micro_blog_bearer_token: Option<String>,
    pub forum_client_id: Option<String>,
    pub forum_client_secret: Option<String>,
    pub forum_user_agent: String,
    pub news_api_key: Option<String>,
    pub alpha_vantage_api_key: Option<String>,

    // --- Scorer ---
    pub gemini_api_key: Option<String>,

    // --- HTTP façade ---
    pub server_host: String,
    pub server_port: u16,

    // --- Trading universe & thresholds ---
    pub default_symbols: Vec<String>,
    pub confidence_threshold: f64,
    pub max_daily_loss: Decimal,
    pub max_trades_per_day: u32,
    pub cooldown_seconds: u64,

    // --- Aggregator weights ---
    pub micro_blog_weight: f64,
    pub forum_weight: f64,
    pub news_weight: f64,

    // --- Indicator parameters ---
    pub fast_period: usize,
    pub slow_period: usize,
    pub atr_period: usize,
    pub rsi_period: usize,

    // --- MarketStore capacities ---
    pub tick_ring_capacity: usize,
    pub bar_ring_capacity: usize,
    pub bar_interval_minutes: u32,

    // --- Risk sizing ---
    pub account_size: Decimal,
    pub risk_pct: f64,
    pub max_position_size: u32,
    pub stop_atr_multiplier: f64,
    pub target_atr_multiplier: f64,

    // --- Streams ---
    pub heartbeat_seconds: u64,

    // --- Persistence ---
    pub database_url: String,

    // --- Observability ---
    pub log_level: String,
    pub observability_enabled: bool,
    pub observability_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tradovate_username = env::var("TRADOVATE_USERNAME").unwrap_or_default();
        let tradovate_password = env::var("TRADOVATE_PASSWORD").unwrap_or_default();
        let tradovate_app_id = env::var("TRADOVATE_APP_ID").unwrap_or_default();
        let tradovate_cid = env::var("TRADOVATE_CID").unwrap_or_default();
        let tradovate_secret = env::var("TRADOVATE_SECRET").unwrap_or_default();
        let broker_base_url = env::var("TRADOVATE_BASE_URL")
            .unwrap_or_else(|_| "https://demo.tradovateapi.com/v1".to_string());
        let broker_ws_url = env::var("TRADOVATE_WS_URL")
            .unwrap_or_else(|_| "wss://demo.tradovateapi.com/v1/websocket".to_string());

        let micro_blog_bearer_token = non_empty(env::var("TWITTER_BEARER_TOKEN").ok());
        let forum_client_id = non_empty(env::var("REDDIT_CLIENT_ID").ok());
        let forum_client_secret = non_empty(env::var("REDDIT_CLIENT_SECRET").ok());
        let forum_user_agent = env::var("REDDIT_USER_AGENT")
            .unwrap_or_else(|_| "sentinel-agent/0.1".to_string());
        let news_api_key = non_empty(env::var("NEWS_API_KEY").ok());
        let alpha_vantage_api_key = non_empty(env::var("ALPHA_VANTAGE_API_KEY").ok());
        let gemini_api_key = non_empty(env::var("GEMINI_API_KEY").ok());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = parse_env("SERVER_PORT", 8080u16)?;

        let default_symbols: Vec<String> = env::var("DEFAULT_SYMBOLS")
            .unwrap_or_else(|_| "MNQ".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let confidence_threshold = parse_env("CONFIDENCE_THRESHOLD", 0.55f64)?;
        let max_daily_loss_f = parse_env("MAX_DAILY_LOSS", 500.0f64)?;
        let max_daily_loss =
            Decimal::from_f64(max_daily_loss_f).context("MAX_DAILY_LOSS out of range")?;
        let max_trades_per_day = parse_env("MAX_TRADES_PER_DAY", 10u32)?;
        let cooldown_seconds = parse_env("COOLDOWN_SECONDS", 30u64)?;

        let twitter_weight = parse_env("TWITTER_WEIGHT", 0.3f64)?;
        let reddit_weight = parse_env("REDDIT_WEIGHT", 0.3f64)?;
        let news_weight = parse_env("NEWS_WEIGHT", 0.4f64)?;
        let weight_sum = twitter_weight + reddit_weight + news_weight;
        let (micro_blog_weight, forum_weight, news_weight) = if weight_sum > 0.0 {
            (
                twitter_weight / weight_sum,
                reddit_weight / weight_sum,
                news_weight / weight_sum,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let fast_period = parse_env("FAST_PERIOD", 9usize)?;
        let slow_period = parse_env("SLOW_PERIOD", 21usize)?;
        let atr_period = parse_env("ATR_PERIOD", 14usize)?;
        let rsi_period = parse_env("RSI_PERIOD", 14usize)?;

        let tick_ring_capacity = parse_env("TICK_RING_CAPACITY", 10_000usize)?;
        let bar_ring_capacity = parse_env("BAR_RING_CAPACITY", 500usize)?;
        let bar_interval_minutes = parse_env("BAR_INTERVAL_MINUTES", 5u32)?;

        let account_size_f = parse_env("ACCOUNT_SIZE", 50_000.0f64)?;
        let account_size =
            Decimal::from_f64(account_size_f).context("ACCOUNT_SIZE out of range")?;
        let risk_pct = parse_env("RISK_PCT", 1.0f64)?;
        let max_position_size = parse_env("MAX_POSITION_SIZE", 5u32)?;
        let stop_atr_multiplier = parse_env("STOP_ATR_MULTIPLIER", 1.5f64)?;
        let target_atr_multiplier = parse_env("TARGET_ATR_MULTIPLIER", 2.0f64)?;

        let heartbeat_seconds = parse_env("HEARTBEAT_SECONDS", 25u64)?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://sentinel.db".to_string());

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let observability_enabled = parse_env("OBSERVABILITY_ENABLED", true)?;
        let observability_interval_seconds = parse_env("OBSERVABILITY_INTERVAL", 60u64)?;

        Ok(Config {
            tradovate_username,
            tradovate_password,
            tradovate_app_id,
            tradovate_cid,
            tradovate_secret,
            broker_base_url,
            broker_ws_url,
            micro_blog_bearer_token,
            forum_client_id,
            forum_client_secret,
            forum_user_agent,
            news_api_key,
            alpha_vantage_api_key,
            gemini_api_key,
            server_host,
            server_port,
            default_symbols,
            confidence_threshold,
            max_daily_loss,
            max_trades_per_day,
            cooldown_seconds,
            micro_blog_weight,
            forum_weight,
            news_weight,
            fast_period,
            slow_period,
            atr_period,
            rsi_period,
            tick_ring_capacity,
            bar_ring_capacity,
            bar_interval_minutes,
            account_size,
            risk_pct,
            max_position_size,
            stop_atr_multiplier,
            target_atr_multiplier,
            heartbeat_seconds,
            database_url,
            log_level,
            observability_enabled,
            observability_interval_seconds,
        })
    }

    /// Presence of the brokerage credential set, mirrored by
    /// `micro_blog_enabled`/`forum_enabled`/`news_enabled` below for
    /// their own credential groups.
    pub fn has_broker_credentials(&self) -> bool {
        !self.tradovate_username.is_empty() && !self.tradovate_password.is_empty()
    }

    pub fn micro_blog_enabled(&self) -> bool {
        self.micro_blog_bearer_token.is_some()
    }

    pub fn forum_enabled(&self) -> bool {
        self.forum_client_id.is_some() && self.forum_client_secret.is_some()
    }

    pub fn news_enabled(&self) -> bool {
        self.news_api_key.is_some() || self.alpha_vantage_api_key.is_some()
    }

    pub fn scorer_enabled(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => bail!("{key} is not valid unicode"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_uses_default_when_absent() {
        // SAFETY: test-only env mutation, no concurrent access in this process.
        unsafe {
            env::remove_var("SENTINEL_TEST_ABSENT_KEY");
        }
        let v: u32 = parse_env("SENTINEL_TEST_ABSENT_KEY", 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn parse_env_rejects_malformed_value() {
        // SAFETY: test-only env mutation, no concurrent access in this process.
        unsafe {
            env::set_var("SENTINEL_TEST_BAD_KEY", "not-a-number");
        }
        let result: Result<u32> = parse_env("SENTINEL_TEST_BAD_KEY", 7);
        assert!(result.is_err());
        unsafe {
            env::remove_var("SENTINEL_TEST_BAD_KEY");
        }
    }

    #[test]
    fn aggregator_weights_normalize_to_one() {
        // SAFETY: test-only env mutation, no concurrent access in this process.
        unsafe {
            env::set_var("TWITTER_WEIGHT", "1.0");
            env::set_var("REDDIT_WEIGHT", "1.0");
            env::set_var("NEWS_WEIGHT", "2.0");
        }
        let cfg = Config::from_env().unwrap();
        let sum = cfg.micro_blog_weight + cfg.forum_weight + cfg.news_weight;
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((cfg.news_weight - 0.5).abs() < 1e-9);
        unsafe {
            env::remove_var("TWITTER_WEIGHT");
            env::remove_var("REDDIT_WEIGHT");
            env::remove_var("NEWS_WEIGHT");
        }
    }
}
