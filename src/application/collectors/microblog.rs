//! Micro-blog collector: recent-search over a
//! symbol's term set, excluding retweets and non-English posts.
//! Engagement is a log-scaled, verified-boosted function of the public
//! metrics on the post.

use crate::application::collectors::{log1p_engagement, SymbolProfiles};
use crate::domain::ports::Collector;
use crate::domain::types::{DataSource, Observation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

const RECENT_SEARCH_URL: &str = "https://api.x.com/2/tweets/search/recent";

#[derive(Debug, Deserialize, Default)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    quote_count: u64,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public_metrics: PublicMetrics,
    #[serde(default)]
    referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Deserialize)]
struct ReferencedTweet {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Post>,
}

/// Engagement score: `log1p(likes + 2*reposts + 1.5*replies +
/// 2*quotes)/10`, clamped, then boosted ×1.5 (capped at 1) for
/// verified authors.
fn engagement_score(metrics: &PublicMetrics, verified: bool) -> f64 {
    let raw = metrics.like_count as f64
        + 2.0 * metrics.retweet_count as f64
        + 1.5 * metrics.reply_count as f64
        + 2.0 * metrics.quote_count as f64;
    let base = log1p_engagement(raw, 10.0);
    if verified {
        (base * 1.5).min(1.0)
    } else {
        base
    }
}

fn is_retweet(post: &Post) -> bool {
    post.referenced_tweets.iter().any(|r| r.kind == "retweeted")
}

pub struct MicroBlogCollector {
    client: ClientWithMiddleware,
    bearer_token: Option<String>,
    profiles: SymbolProfiles,
    verified_authors: std::sync::Mutex<HashMap<String, bool>>,
}

impl MicroBlogCollector {
    pub fn new(client: ClientWithMiddleware, bearer_token: Option<String>) -> Self {
        MicroBlogCollector {
            client,
            bearer_token,
            profiles: SymbolProfiles::new(),
            verified_authors: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn is_verified(&self, author_id: &str) -> bool {
        self.verified_authors
            .lock()
            .ok()
            .and_then(|m| m.get(author_id).copied())
            .unwrap_or(false)
    }

    fn build_observation(&self, symbol: &str, post: Post) -> Observation {
        let verified = post.author_id.as_deref().map(|id| self.is_verified(id)).unwrap_or(false);
        let engagement = engagement_score(&post.public_metrics, verified);
        let mut metadata = HashMap::new();
        metadata.insert("likes".to_string(), post.public_metrics.like_count.to_string());
        metadata.insert("reposts".to_string(), post.public_metrics.retweet_count.to_string());
        Observation {
            source: DataSource::MicroBlog,
            symbol: symbol.to_string(),
            text: post.text,
            timestamp: post.created_at.unwrap_or_else(Utc::now),
            author: post.author_id,
            url: Some(format!("https://x.com/i/web/status/{}", post.id)),
            engagement_score: engagement,
            metadata,
        }
    }

    async fn search(&self, symbol: &str, query: String, limit: usize) -> anyhow::Result<Vec<Observation>> {
        let token = self
            .bearer_token
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("micro-blog collector disabled"))?;

        let resp = self
            .client
            .get(RECENT_SEARCH_URL)
            .bearer_auth(token)
            .query(&[
                ("query", query.as_str()),
                ("max_results", &limit.max(10).to_string()),
                ("tweet.fields", "created_at,public_metrics,author_id,referenced_tweets,lang"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        let mut observations: Vec<Observation> = resp
            .data
            .into_iter()
            .filter(|p| !is_retweet(p))
            .map(|p| self.build_observation(symbol, p))
            .collect();

        observations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        observations.truncate(limit);
        Ok(observations)
    }

    async fn fetch(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<Observation>> {
        let profile = self.profiles.lookup(symbol);
        let query = format!(
            "({}) lang:en -is:retweet",
            profile.micro_blog_terms.join(" OR ")
        );
        self.search(symbol, query, limit).await
    }

    /// Polls a fixed watch-list of influential accounts instead of a
    /// keyword search. Not wired into the default collection loop;
    /// available for an operator-triggered refresh.
    pub async fn collect_from_accounts(&self, symbol: &str, handles: &[String], limit: usize) -> Vec<Observation> {
        if handles.is_empty() {
            return Vec::new();
        }
        let from_clause = handles.iter().map(|h| format!("from:{h}")).collect::<Vec<_>>().join(" OR ");
        let query = format!("({from_clause}) lang:en -is:retweet");
        match self.search(symbol, query, limit).await {
            Ok(obs) => obs,
            Err(e) => {
                warn!(symbol, error = %e, "micro-blog account collector failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Collector for MicroBlogCollector {
    fn name(&self) -> &'static str {
        "micro-blog"
    }

    async fn initialize(&self) -> bool {
        self.bearer_token.is_some()
    }

    async fn collect(&self, symbol: &str, limit: usize) -> Vec<Observation> {
        match self.fetch(symbol, limit).await {
            Ok(obs) => obs,
            Err(e) => {
                warn!(symbol, error = %e, "micro-blog collector failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_score_matches_weighted_formula() {
        let metrics = PublicMetrics {
            like_count: 100,
            retweet_count: 10,
            reply_count: 4,
            quote_count: 2,
        };
        let raw = 100.0 + 2.0 * 10.0 + 1.5 * 4.0 + 2.0 * 2.0;
        let expected = (raw.ln_1p() / 10.0).clamp(0.0, 1.0);
        assert!((engagement_score(&metrics, false) - expected).abs() < 1e-9);
    }

    #[test]
    fn verified_boost_is_capped_at_one() {
        let metrics = PublicMetrics {
            like_count: 1_000_000,
            retweet_count: 500_000,
            reply_count: 100_000,
            quote_count: 100_000,
        };
        assert_eq!(engagement_score(&metrics, true), 1.0);
    }

    #[test]
    fn collect_from_accounts_is_empty_for_no_handles() {
        let collector = MicroBlogCollector::new(
            reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build(),
            None,
        );
        let result = futures::executor::block_on(collector.collect_from_accounts("MNQ", &[], 10));
        assert!(result.is_empty());
    }

    #[test]
    fn retweets_are_excluded() {
        let post = Post {
            id: "1".to_string(),
            text: "hi".to_string(),
            author_id: None,
            created_at: None,
            public_metrics: PublicMetrics::default(),
            referenced_tweets: vec![ReferencedTweet { kind: "retweeted".to_string() }],
        };
        assert!(is_retweet(&post));
    }
}
