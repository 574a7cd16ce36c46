//! LLM-backed `Scorer` (§4.5). Batches up to 20 excerpts per call,
//! truncated to 500 characters each, and asks the model for a single
//! scored verdict per batch. Any transport or parse failure degrades to
//! a neutral result rather than propagating — the Decider must never
//! block on this collaborator.

use crate::domain::ports::{Adjudication, Scorer};
use crate::domain::types::{Action, AggregatedSentiment, MarketImpact, SentimentResult, Urgency};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_EXCERPTS: usize = 20;
const MAX_EXCERPT_CHARS: usize = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const TEMPERATURE: f64 = 0.3;

pub struct GeminiScorer {
    http: Client,
    api_key: String,
    model: String,
}

impl GeminiScorer {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiScorer {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_else(|_| Client::new()),
            api_key: api_key.into(),
            model: "gemini-1.5-flash".to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    fn build_analysis_prompt(texts: &[String], symbol: &str, sources: &[String]) -> String {
        let excerpts: Vec<String> = texts
            .iter()
            .take(MAX_EXCERPTS)
            .zip(sources.iter().chain(std::iter::repeat(&"unknown".to_string())))
            .enumerate()
            .map(|(i, (text, source))| {
                let truncated: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
                format!("{}. [{}] {}", i + 1, source, truncated)
            })
            .collect();

        format!(
            "You are a futures-market sentiment analyst. Evaluate the following {} excerpts \
             about {symbol} as a single batch and respond with strict JSON only, no prose, no \
             code fences:\n\
             {{\"score\": <float -1..1>, \"confidence\": <float 0..1>, \"action\": \"BUY\"|\"SELL\"|\"HOLD\", \
             \"reasoning\": <string>, \"themes\": [<string>...], \"urgency\": \"LOW\"|\"MED\"|\"HIGH\", \
             \"market_impact\": \"POS\"|\"NEG\"|\"NEU\"}}\n\n{}",
            excerpts.len(),
            excerpts.join("\n")
        )
    }

    fn build_adjudication_prompt(sentiment: &AggregatedSentiment, technical_signal: Option<i8>, regime: Option<&str>) -> String {
        format!(
            "Adjudicate a trade decision for {}. Aggregated sentiment score={:.3} \
             confidence={:.3} suggested_action={}. Technical signal={:?}. Market regime={:?}. \
             Respond with strict JSON only: {{\"action\": \"BUY\"|\"SELL\"|\"HOLD\", \"qty\": <int>, \
             \"confidence\": <float 0..1>, \"reasoning\": <string>}}",
            sentiment.symbol, sentiment.composite_score, sentiment.confidence, sentiment.action,
            technical_signal, regime
        )
    }

    async fn call_model(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": TEMPERATURE},
        });

        let resp = self.http.post(self.endpoint()).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("gemini returned status {}", resp.status());
        }
        let parsed: GenerateContentResponse = resp.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("empty gemini response"))?;
        Ok(text)
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Model output is usually clean JSON but sometimes arrives wrapped in a
/// fenced code block (```json ... ```); strip that before parsing.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

#[derive(Deserialize)]
struct AnalysisPayload {
    score: f64,
    confidence: f64,
    action: String,
    reasoning: String,
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default = "default_urgency")]
    urgency: String,
    #[serde(default = "default_impact")]
    market_impact: String,
}

fn default_urgency() -> String {
    "LOW".to_string()
}
fn default_impact() -> String {
    "NEU".to_string()
}

fn parse_action(s: &str) -> Action {
    match s.to_ascii_uppercase().as_str() {
        "BUY" => Action::Buy,
        "SELL" => Action::Sell,
        _ => Action::Hold,
    }
}

fn parse_urgency(s: &str) -> Urgency {
    match s.to_ascii_uppercase().as_str() {
        "HIGH" => Urgency::High,
        "MED" => Urgency::Med,
        _ => Urgency::Low,
    }
}

fn parse_impact(s: &str) -> MarketImpact {
    match s.to_ascii_uppercase().as_str() {
        "POS" => MarketImpact::Pos,
        "NEG" => MarketImpact::Neg,
        _ => MarketImpact::Neu,
    }
}

#[derive(Deserialize)]
struct AdjudicationPayload {
    action: String,
    qty: u32,
    confidence: f64,
    reasoning: String,
}

#[async_trait]
impl Scorer for GeminiScorer {
    async fn analyze(&self, texts: &[String], symbol: &str, sources: &[String]) -> SentimentResult {
        if texts.is_empty() {
            return SentimentResult::neutral();
        }

        let prompt = Self::build_analysis_prompt(texts, symbol, sources);
        let raw = match self.call_model(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, symbol, "gemini analysis call failed, falling back to neutral");
                return SentimentResult::neutral();
            }
        };

        match serde_json::from_str::<AnalysisPayload>(strip_code_fence(&raw)) {
            Ok(payload) => SentimentResult {
                score: payload.score.clamp(-1.0, 1.0),
                confidence: payload.confidence.clamp(0.0, 1.0),
                action: parse_action(&payload.action),
                reasoning: payload.reasoning,
                themes: payload.themes,
                urgency: parse_urgency(&payload.urgency),
                market_impact: parse_impact(&payload.market_impact),
                timestamp: chrono::Utc::now(),
            },
            Err(e) => {
                debug!(error = %e, raw, "gemini analysis response failed to parse, falling back to neutral");
                SentimentResult::neutral()
            }
        }
    }

    async fn decide(&self, sentiment: &AggregatedSentiment, technical_signal: Option<i8>, regime: Option<&str>) -> Adjudication {
        let prompt = Self::build_adjudication_prompt(sentiment, technical_signal, regime);
        let raw = match self.call_model(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, symbol = %sentiment.symbol, "gemini adjudication call failed, defaulting to hold");
                return Adjudication { action: Action::Hold, qty: 0, confidence: 0.0, reasoning: "adjudication unavailable".to_string() };
            }
        };

        match serde_json::from_str::<AdjudicationPayload>(strip_code_fence(&raw)) {
            Ok(payload) => Adjudication {
                action: parse_action(&payload.action),
                qty: payload.qty,
                confidence: payload.confidence.clamp(0.0, 1.0),
                reasoning: payload.reasoning,
            },
            Err(e) => {
                debug!(error = %e, raw, "gemini adjudication response failed to parse, defaulting to hold");
                Adjudication { action: Action::Hold, qty: 0, confidence: 0.0, reasoning: "adjudication response unparseable".to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json_code_block() {
        let wrapped = "```json\n{\"score\": 0.5}\n```";
        assert_eq!(strip_code_fence(wrapped), "{\"score\": 0.5}");
    }

    #[test]
    fn passes_through_plain_json() {
        let plain = "{\"score\": 0.5}";
        assert_eq!(strip_code_fence(plain), "{\"score\": 0.5}");
    }

    #[test]
    fn prompt_caps_excerpts_at_twenty() {
        let texts: Vec<String> = (0..30).map(|i| format!("excerpt {i}")).collect();
        let sources: Vec<String> = (0..30).map(|_| "news".to_string()).collect();
        let prompt = GeminiScorer::build_analysis_prompt(&texts, "MNQ", &sources);
        assert!(prompt.contains("20 excerpts"));
        assert!(!prompt.contains("excerpt 20"));
    }

    #[tokio::test]
    async fn analyze_on_empty_input_is_neutral_without_a_network_call() {
        let scorer = GeminiScorer::new("unused-key");
        let result = scorer.analyze(&[], "MNQ", &[]).await;
        assert_eq!(result.action, Action::Hold);
        assert_eq!(result.confidence, 0.0);
    }
}
