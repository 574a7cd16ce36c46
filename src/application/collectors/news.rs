//! News collector: fans out to 0–2 backends in
//! parallel. The general-news backend is reputation-weighted by
//! outlet tier; the sentiment-annotated backend carries its own
//! per-article sentiment score, converted into an engagement weight.

use crate::application::collectors::SymbolProfiles;
use crate::domain::ports::Collector;
use crate::domain::types::{DataSource, Observation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

const TIER1_OUTLETS: &[&str] = &["Reuters", "Bloomberg", "The Wall Street Journal", "Financial Times"];
const TIER2_OUTLETS: &[&str] = &["CNBC", "MarketWatch", "Barron's", "Business Insider"];
const TIER3_OUTLETS: &[&str] = &["Yahoo Entertainment", "Seeking Alpha", "Benzinga"];

fn reputation_score(source_name: &str) -> f64 {
    if TIER1_OUTLETS.iter().any(|o| o.eq_ignore_ascii_case(source_name)) {
        0.95
    } else if TIER2_OUTLETS.iter().any(|o| o.eq_ignore_ascii_case(source_name)) {
        0.75
    } else if TIER3_OUTLETS.iter().any(|o| o.eq_ignore_ascii_case(source_name)) {
        0.55
    } else {
        0.40
    }
}

#[derive(Debug, Deserialize)]
struct GeneralNewsSource {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct GeneralNewsArticle {
    #[serde(default)]
    source: GeneralNewsSource,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Default)]
struct GeneralNewsResponse {
    #[serde(default)]
    articles: Vec<GeneralNewsArticle>,
}

#[derive(Debug, Deserialize)]
struct SentimentArticle {
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    time_published: String,
    #[serde(default)]
    overall_sentiment_score: f64,
}

#[derive(Debug, Deserialize, Default)]
struct SentimentResponse {
    #[serde(default, rename = "feed")]
    feed: Vec<SentimentArticle>,
}

fn parse_alpha_vantage_timestamp(raw: &str) -> DateTime<Utc> {
    // Format: YYYYMMDDTHHMMSS
    chrono::NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
        .map(|d| d.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

pub struct NewsCollector {
    client: ClientWithMiddleware,
    news_api_key: Option<String>,
    alpha_vantage_api_key: Option<String>,
    profiles: SymbolProfiles,
}

impl NewsCollector {
    pub fn new(
        client: ClientWithMiddleware,
        news_api_key: Option<String>,
        alpha_vantage_api_key: Option<String>,
    ) -> Self {
        NewsCollector {
            client,
            news_api_key,
            alpha_vantage_api_key,
            profiles: SymbolProfiles::new(),
        }
    }

    async fn fetch_general(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<Observation>> {
        let key = self
            .news_api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("general-news backend disabled"))?;
        let terms = self.profiles.lookup(symbol).news_terms;
        let query = terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR ");
        let from = (Utc::now() - chrono::Duration::hours(24)).to_rfc3339();

        let resp: GeneralNewsResponse = self
            .client
            .get("https://newsapi.org/v2/everything")
            .query(&[
                ("q", query.as_str()),
                ("from", from.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", &limit.to_string()),
                ("apiKey", key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let observations = resp
            .articles
            .into_iter()
            .map(|a| {
                let engagement = reputation_score(&a.source.name);
                let mut metadata = HashMap::new();
                metadata.insert("outlet".to_string(), a.source.name.clone());
                Observation {
                    source: DataSource::News,
                    symbol: symbol.to_string(),
                    text: format!("{}\n{}", a.title, a.description.unwrap_or_default()),
                    timestamp: a.published_at,
                    author: a.author,
                    url: a.url,
                    engagement_score: engagement,
                    metadata,
                }
            })
            .collect();
        Ok(observations)
    }

    async fn fetch_sentiment_annotated(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<Observation>> {
        let key = self
            .alpha_vantage_api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("sentiment-annotated backend disabled"))?;
        let terms = self.profiles.lookup(symbol).news_terms;

        let resp: SentimentResponse = self
            .client
            .get("https://www.alphavantage.co/query")
            .query(&[
                ("function", "NEWS_SENTIMENT"),
                ("tickers", symbol),
                ("apikey", key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut observations: Vec<Observation> = resp
            .feed
            .into_iter()
            .filter(|a| {
                let haystack = format!("{} {}", a.title, a.summary).to_lowercase();
                terms.iter().any(|t| haystack.contains(&t.to_lowercase()))
            })
            .map(|a| {
                let engagement = ((a.overall_sentiment_score + 1.0) / 2.0).clamp(0.0, 1.0);
                let mut metadata = HashMap::new();
                if let Some(src) = &a.source {
                    metadata.insert("outlet".to_string(), src.clone());
                }
                Observation {
                    source: DataSource::News,
                    symbol: symbol.to_string(),
                    text: format!("{}\n{}", a.title, a.summary),
                    timestamp: parse_alpha_vantage_timestamp(&a.time_published),
                    author: None,
                    url: a.url,
                    engagement_score: engagement,
                    metadata,
                }
            })
            .collect();
        observations.truncate(limit);
        Ok(observations)
    }
}

#[async_trait]
impl Collector for NewsCollector {
    fn name(&self) -> &'static str {
        "news"
    }

    async fn initialize(&self) -> bool {
        self.news_api_key.is_some() || self.alpha_vantage_api_key.is_some()
    }

    async fn collect(&self, symbol: &str, limit: usize) -> Vec<Observation> {
        let (general_result, sentiment_result) = tokio::join!(
            self.fetch_general(symbol, limit),
            self.fetch_sentiment_annotated(symbol, limit)
        );

        let general = general_result.unwrap_or_else(|e| {
            warn!(symbol, error = %e, "general-news backend failed");
            Vec::new()
        });
        let sentiment = sentiment_result.unwrap_or_else(|e| {
            warn!(symbol, error = %e, "sentiment-annotated backend failed");
            Vec::new()
        });

        let mut combined: Vec<Observation> = general.into_iter().chain(sentiment).collect();
        combined.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        combined.truncate(limit);
        combined
    }
}
