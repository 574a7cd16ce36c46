//! Forum (Reddit-shaped) collector: searches a fixed
//! subreddit set with a "hot/day" filter, plus scans each subreddit's
//! current hot list for title+body term matches. Deduplicated by post
//! id.

use crate::application::collectors::{log1p_engagement, SymbolProfiles};
use crate::domain::ports::Collector;
use crate::domain::types::{DataSource, Observation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

const SUBREDDITS: &[&str] = &["wallstreetbets", "investing", "stocks", "futures", "Daytrading"];

#[derive(Debug, Deserialize, Default)]
struct PostData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    total_awards_received: i64,
    #[serde(default)]
    upvote_ratio: f64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    permalink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostWrapper {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize, Default)]
struct ListingData {
    #[serde(default)]
    children: Vec<PostWrapper>,
}

#[derive(Debug, Deserialize, Default)]
struct CommentData {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    permalink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentWrapper {
    data: CommentData,
}

#[derive(Debug, Deserialize)]
struct CommentListing {
    data: CommentListingData,
}

#[derive(Debug, Deserialize, Default)]
struct CommentListingData {
    #[serde(default)]
    children: Vec<CommentWrapper>,
}

/// Same weighted-engagement shape as a post, with reply count standing
/// in for `num_comments` and no awards field in the comment payload.
fn comment_engagement_score(comment: &CommentData, reply_count: i64) -> f64 {
    let raw = comment.score as f64 + 2.0 * reply_count as f64;
    log1p_engagement(raw, 12.0)
}

fn comment_to_observation(symbol: &str, comment: CommentData, reply_count: i64) -> Observation {
    let engagement = comment_engagement_score(&comment, reply_count);
    let mut metadata = HashMap::new();
    metadata.insert("score".to_string(), comment.score.to_string());
    metadata.insert("replies".to_string(), reply_count.to_string());
    let timestamp = DateTime::from_timestamp(comment.created_utc as i64, 0).unwrap_or_else(Utc::now);
    Observation {
        source: DataSource::Forum,
        symbol: symbol.to_string(),
        text: comment.body,
        timestamp,
        author: comment.author,
        url: comment.permalink.map(|p| format!("https://reddit.com{p}")),
        engagement_score: engagement,
        metadata,
    }
}

/// `log1p((score + 2*comments + 5*awards) · (0.5 + 0.5*upvoteRatio)) / 12`,
/// clamped to `[0, 1]`.
fn engagement_score(post: &PostData) -> f64 {
    let raw = post.score as f64 + 2.0 * post.num_comments as f64 + 5.0 * post.total_awards_received as f64;
    let weighted = raw * (0.5 + 0.5 * post.upvote_ratio);
    log1p_engagement(weighted, 12.0)
}

fn matches_terms(post: &PostData, terms: &[String]) -> bool {
    let haystack = format!("{} {}", post.title, post.selftext).to_lowercase();
    terms.iter().any(|t| haystack.contains(&t.to_lowercase()))
}

fn to_observation(symbol: &str, post: PostData) -> Observation {
    let engagement = engagement_score(&post);
    let mut metadata = HashMap::new();
    metadata.insert("score".to_string(), post.score.to_string());
    metadata.insert("comments".to_string(), post.num_comments.to_string());
    let timestamp = DateTime::from_timestamp(post.created_utc as i64, 0).unwrap_or_else(Utc::now);
    Observation {
        source: DataSource::Forum,
        symbol: symbol.to_string(),
        text: format!("{}\n{}", post.title, post.selftext),
        timestamp,
        author: post.author,
        url: post.permalink.map(|p| format!("https://reddit.com{p}")),
        engagement_score: engagement,
        metadata,
    }
}

pub struct ForumCollector {
    client: ClientWithMiddleware,
    enabled: bool,
    user_agent: String,
    profiles: SymbolProfiles,
}

impl ForumCollector {
    pub fn new(client: ClientWithMiddleware, enabled: bool, user_agent: String) -> Self {
        ForumCollector {
            client,
            enabled,
            user_agent,
            profiles: SymbolProfiles::new(),
        }
    }

    async fn fetch_listing(&self, url: &str) -> anyhow::Result<Vec<PostData>> {
        let resp: Listing = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.data.children.into_iter().map(|w| w.data).collect())
    }

    async fn fetch(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<Observation>> {
        if !self.enabled {
            anyhow::bail!("forum collector disabled");
        }
        let terms = self.profiles.lookup(symbol).forum_terms;
        let mut seen = HashSet::new();
        let mut posts = Vec::new();

        for sub in SUBREDDITS {
            let search_url = format!(
                "https://oauth.reddit.com/r/{sub}/search?q={}&restrict_sr=1&sort=hot&t=day",
                terms.join(" OR ")
            );
            if let Ok(found) = self.fetch_listing(&search_url).await {
                for post in found {
                    if seen.insert(post.id.clone()) {
                        posts.push(post);
                    }
                }
            }

            let hot_url = format!("https://oauth.reddit.com/r/{sub}/hot");
            if let Ok(hot) = self.fetch_listing(&hot_url).await {
                for post in hot {
                    if matches_terms(&post, &terms) && seen.insert(post.id.clone()) {
                        posts.push(post);
                    }
                }
            }
        }

        posts.sort_by(|a, b| b.created_utc.partial_cmp(&a.created_utc).unwrap_or(std::cmp::Ordering::Equal));
        posts.truncate(limit);
        Ok(posts.into_iter().map(|p| to_observation(symbol, p)).collect())
    }

    /// Comment-level collection on a specific thread, using the same
    /// engagement formula as posts applied to comment score/reply count.
    /// Not wired into the default collection loop.
    pub async fn collect_comments(&self, post_id: &str, symbol: &str, limit: usize) -> Vec<Observation> {
        match self.fetch_comments(post_id, symbol, limit).await {
            Ok(obs) => obs,
            Err(e) => {
                warn!(symbol, post_id, error = %e, "forum comment collector failed");
                Vec::new()
            }
        }
    }

    async fn fetch_comments(&self, post_id: &str, symbol: &str, limit: usize) -> anyhow::Result<Vec<Observation>> {
        if !self.enabled {
            anyhow::bail!("forum collector disabled");
        }
        let url = format!("https://oauth.reddit.com/comments/{post_id}");
        let listings: Vec<CommentListing> = self
            .client
            .get(&url)
            .header("User-Agent", self.user_agent.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let comments: Vec<CommentData> = listings
            .into_iter()
            .nth(1)
            .map(|listing| listing.data.children.into_iter().map(|w| w.data).collect())
            .unwrap_or_default();

        let mut observations: Vec<Observation> = comments
            .into_iter()
            .map(|c| comment_to_observation(symbol, c, 0))
            .collect();
        observations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        observations.truncate(limit);
        Ok(observations)
    }
}

#[async_trait]
impl Collector for ForumCollector {
    fn name(&self) -> &'static str {
        "forum"
    }

    async fn initialize(&self) -> bool {
        self.enabled
    }

    async fn collect(&self, symbol: &str, limit: usize) -> Vec<Observation> {
        match self.fetch(symbol, limit).await {
            Ok(obs) => obs,
            Err(e) => {
                warn!(symbol, error = %e, "forum collector failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(score: i64, comments: i64, awards: i64, ratio: f64) -> PostData {
        PostData {
            id: "abc".to_string(),
            title: "MNQ futures breaking out".to_string(),
            selftext: String::new(),
            author: None,
            score,
            num_comments: comments,
            total_awards_received: awards,
            upvote_ratio: ratio,
            created_utc: 0.0,
            permalink: None,
        }
    }

    #[test]
    fn engagement_score_matches_weighted_formula() {
        let p = post(100, 20, 2, 0.9);
        let raw = 100.0 + 2.0 * 20.0 + 5.0 * 2.0;
        let weighted = raw * (0.5 + 0.5 * 0.9);
        let expected = (weighted.ln_1p() / 12.0).clamp(0.0, 1.0);
        assert!((engagement_score(&p) - expected).abs() < 1e-9);
    }

    #[test]
    fn comment_engagement_score_matches_weighted_formula() {
        let comment = CommentData {
            id: "c1".to_string(),
            body: "this is bullish".to_string(),
            author: None,
            score: 50,
            created_utc: 0.0,
            permalink: None,
        };
        let expected = ((50.0 + 2.0 * 3.0_f64).ln_1p() / 12.0).clamp(0.0, 1.0);
        assert!((comment_engagement_score(&comment, 3) - expected).abs() < 1e-9);
    }

    #[test]
    fn matches_terms_checks_title_and_body() {
        let mut p = post(1, 1, 0, 1.0);
        p.title = "daily discussion".to_string();
        p.selftext = "NQ futures looking strong".to_string();
        assert!(matches_terms(&p, &["NQ futures".to_string()]));
        assert!(!matches_terms(&p, &["unrelated ticker".to_string()]));
    }
}
