//! Thin HTTP façade exposing the fused signal, health, and metrics to
//! an external strategy host, plus the three kill-switch control
//! endpoints: a single `Router` over shared `Arc` state, CORS
//! permissive, JSON everywhere. Never authenticated — this process is
//! meant to run behind a private network boundary, not exposed
//! publicly.

use crate::application::supervisor::Supervisor;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

const SIGNAL_CACHE_TTL: Duration = Duration::from_secs(30);

struct AppState {
    supervisor: Arc<Supervisor>,
    signal_cache: Mutex<HashMap<String, (Instant, SignalResponse)>>,
}

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let state = Arc::new(AppState { supervisor, signal_cache: Mutex::new(HashMap::new()) });

    Router::new()
        .route("/signal", get(signal))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/kill", post(kill))
        .route("/resume", post(resume))
        .route("/record-trade", post(record_trade))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignalResponse {
    action: String,
    qty: u32,
    confidence: f64,
}

impl SignalResponse {
    fn hold() -> Self {
        SignalResponse { action: "HOLD".to_string(), qty: 0, confidence: 0.0 }
    }
}

#[derive(Deserialize)]
struct SignalQuery {
    symbol: String,
}

/// Never fails: any missing data or internal error degrades to
/// `HOLD/0/0.0` rather than an HTTP error status (§6 scenario S6).
async fn signal(State(state): State<Arc<AppState>>, Query(q): Query<SignalQuery>) -> impl IntoResponse {
    state.supervisor.metrics.record_request();

    {
        let cache = state.signal_cache.lock().await;
        if let Some((fetched_at, cached)) = cache.get(&q.symbol) {
            if fetched_at.elapsed() < SIGNAL_CACHE_TTL {
                return Json(cached.clone());
            }
        }
    }

    let response = match state.supervisor.latest_signal(&q.symbol).await {
        Some(intent) => SignalResponse { action: intent.action.to_string(), qty: intent.qty, confidence: intent.confidence },
        None => SignalResponse::hold(),
    };

    state.signal_cache.lock().await.insert(q.symbol.clone(), (Instant::now(), response.clone()));
    Json(response)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentHealth {
    micro_blog: bool,
    forum: bool,
    news: bool,
    scorer: bool,
    background_collector: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    components: ComponentHealth,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (micro_blog, forum, news, scorer) = state.supervisor.collectors_enabled();
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        components: ComponentHealth {
            micro_blog,
            forum,
            news,
            scorer,
            background_collector: micro_blog || forum || news,
        },
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.supervisor.metrics.snapshot(state.supervisor.risk_gate());
    Json(snapshot)
}

#[derive(Deserialize)]
struct KillQuery {
    #[serde(default)]
    reason: Option<String>,
}

async fn kill(State(state): State<Arc<AppState>>, Query(q): Query<KillQuery>) -> impl IntoResponse {
    let reason = q.reason.unwrap_or_else(|| "manual".to_string());
    state.supervisor.risk_gate().kill(&reason);
    (StatusCode::OK, Json(serde_json::json!({"status": "killed", "reason": reason})))
}

async fn resume(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.supervisor.risk_gate().resume();
    (StatusCode::OK, Json(serde_json::json!({"status": "resumed"})))
}

#[derive(Deserialize)]
struct RecordTradeQuery {
    pnl: f64,
}

async fn record_trade(State(state): State<Arc<AppState>>, Query(q): Query<RecordTradeQuery>) -> impl IntoResponse {
    match rust_decimal::Decimal::try_from(q.pnl) {
        Ok(pnl) => {
            state.supervisor.risk_gate().record_trade(pnl);
            (StatusCode::OK, Json(serde_json::json!({"status": "recorded", "pnl": q.pnl}))).into_response()
        }
        Err(e) => {
            warn!(error = %e, pnl = q.pnl, "record-trade pnl out of range");
            (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "invalid pnl"}))).into_response()
        }
    }
}
