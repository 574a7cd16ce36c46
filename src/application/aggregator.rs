//! Time-decayed, engagement-weighted fusion of observations and their
//! scores into an `AggregatedSentiment`.

use crate::domain::ports::Clock;
use crate::domain::types::{Action, AggregatedSentiment, DataSource, Observation, SentimentResult, Symbol};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    pub micro_blog_weight: f64,
    pub forum_weight: f64,
    pub news_weight: f64,
    pub half_life_minutes: f64,
    pub window_minutes: i64,
    pub confidence_threshold: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            micro_blog_weight: 1.0 / 3.0,
            forum_weight: 1.0 / 3.0,
            news_weight: 1.0 / 3.0,
            half_life_minutes: 30.0,
            window_minutes: 60,
            confidence_threshold: 0.55,
        }
    }
}

impl AggregatorConfig {
    fn weight_for(&self, source: DataSource) -> f64 {
        match source {
            DataSource::MicroBlog => self.micro_blog_weight,
            DataSource::Forum => self.forum_weight,
            DataSource::News => self.news_weight,
        }
    }
}

struct SourceAccumulator {
    weighted_score_sum: f64,
    weight_sum: f64,
    samples: usize,
    scores: Vec<(f64, f64)>, // (score, weight), kept for the variance pass
    themes: Vec<String>,
}

impl SourceAccumulator {
    fn new() -> Self {
        SourceAccumulator {
            weighted_score_sum: 0.0,
            weight_sum: 0.0,
            samples: 0,
            scores: Vec::new(),
            themes: Vec::new(),
        }
    }

    fn add(&mut self, score: f64, weight: f64, themes: &[String]) {
        self.weighted_score_sum += score * weight;
        self.weight_sum += weight;
        self.samples += 1;
        self.scores.push((score, weight));
        self.themes.extend(themes.iter().cloned());
    }

    /// `(average, variance, confidence)` step 3.
    fn stats(&self) -> (f64, f64, f64) {
        if self.weight_sum <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let avg = self.weighted_score_sum / self.weight_sum;
        let variance = self
            .scores
            .iter()
            .map(|(s, w)| (s - avg).powi(2) * w)
            .sum::<f64>()
            / self.weight_sum;
        let confidence = (1.0 / (1.0 + variance)) * (self.samples as f64 / 10.0).min(1.0);
        (avg, variance, confidence)
    }
}

pub struct Aggregator {
    config: AggregatorConfig,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig, clock: Arc<dyn Clock>) -> Self {
        Aggregator { config, clock }
    }

    /// Fuse observations + their (keyed) scores into a composite
    /// sentiment view for one symbol.
    pub fn aggregate(
        &self,
        symbol: &Symbol,
        observations: &[Observation],
        scores: &HashMap<String, SentimentResult>,
    ) -> AggregatedSentiment {
        if observations.is_empty() {
            return AggregatedSentiment::empty(symbol.clone(), self.config.window_minutes);
        }

        let now = self.clock.now();
        let mut buckets: HashMap<DataSource, SourceAccumulator> = HashMap::new();
        let mut all_scored_themes: Vec<String> = Vec::new();
        let mut surviving = 0usize;

        for obs in observations {
            let age_minutes = (now - obs.timestamp).num_seconds() as f64 / 60.0;
            if age_minutes > self.config.window_minutes as f64 || age_minutes < 0.0 {
                continue;
            }
            surviving += 1;

            let result = scores.get(&obs.sentiment_key());
            let (score, confidence, themes): (f64, f64, &[String]) = match result {
                Some(r) => (r.score, r.confidence, &r.themes),
                None => (0.0, 0.3, &[]),
            };

            let time_weight = (-std::f64::consts::LN_2 * age_minutes / self.config.half_life_minutes).exp();
            let weight = time_weight * obs.engagement_score * confidence;

            if let Some(r) = result {
                all_scored_themes.extend(r.themes.iter().cloned());
                let _ = themes;
            }

            buckets
                .entry(obs.source)
                .or_insert_with(SourceAccumulator::new)
                .add(score, weight, &[]);
        }

        if surviving == 0 {
            return AggregatedSentiment::empty(symbol.clone(), self.config.window_minutes);
        }

        let mut per_source_breakdown = HashMap::new();
        let mut weighted_numerator = 0.0;
        let mut weighted_denominator = 0.0;
        let mut source_avgs = Vec::new();
        let mut source_confidences = Vec::new();

        for (source, acc) in &buckets {
            let (avg, _variance, confidence) = acc.stats();
            per_source_breakdown.insert(source.to_string(), avg);
            let w = self.config.weight_for(*source);
            weighted_numerator += avg * w * confidence;
            weighted_denominator += w * confidence;
            source_avgs.push(avg);
            source_confidences.push(confidence);
        }

        let composite_score = if weighted_denominator > 0.0 {
            weighted_numerator / weighted_denominator
        } else {
            0.0
        };

        let agreement = if source_avgs.len() <= 1 {
            0.7
        } else {
            let mean = source_avgs.iter().sum::<f64>() / source_avgs.len() as f64;
            let var = source_avgs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / source_avgs.len() as f64;
            1.0 / (1.0 + 4.0 * var)
        };

        let volume = (surviving as f64 / 20.0).min(1.0);
        let avg_src_conf = if source_confidences.is_empty() {
            0.0
        } else {
            source_confidences.iter().sum::<f64>() / source_confidences.len() as f64
        };
        let overall_confidence = agreement * volume * avg_src_conf;

        let action = if overall_confidence < self.config.confidence_threshold {
            Action::Hold
        } else if composite_score > 0.3 {
            Action::Buy
        } else if composite_score < -0.3 {
            Action::Sell
        } else {
            Action::Hold
        };

        AggregatedSentiment {
            symbol: symbol.clone(),
            composite_score,
            confidence: overall_confidence,
            action,
            per_source_breakdown,
            data_points: surviving,
            window_minutes: self.config.window_minutes,
            themes: top_themes(&all_scored_themes, 5),
            timestamp: now,
        }
    }

    /// Score-only aggregation path (supplemental): the weighted
    /// mean/variance math of the per-source formula, skipping the
    /// observation/time-decay machinery entirely for callers that
    /// already hold `(score, weight)` pairs.
    pub fn quick_aggregate(&self, scores: &[(f64, f64)]) -> (f64, f64) {
        if scores.is_empty() {
            return (0.0, 0.0);
        }
        let mut acc = SourceAccumulator::new();
        for (s, w) in scores {
            acc.add(*s, *w, &[]);
        }
        let (avg, _variance, confidence) = acc.stats();
        (avg, confidence)
    }
}

fn top_themes(themes: &[String], n: usize) -> Vec<String> {
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for t in themes {
        *counts.entry(t).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&&String, &usize)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1));
    ranked.into_iter().take(n).map(|(t, _)| (*t).clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    struct FixedClock(chrono::DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            self.0
        }
    }

    fn obs(source: DataSource, score_text: &str, engagement: f64, age_minutes: i64, now: chrono::DateTime<Utc>) -> Observation {
        Observation {
            source,
            symbol: "MNQ".to_string(),
            text: score_text.to_string(),
            timestamp: now - Duration::minutes(age_minutes),
            author: None,
            url: None,
            engagement_score: engagement,
            metadata: HashMap::new(),
        }
    }

    fn result(score: f64, confidence: f64) -> SentimentResult {
        SentimentResult {
            score,
            confidence,
            action: Action::Hold,
            reasoning: String::new(),
            themes: vec![],
            urgency: crate::domain::types::Urgency::Low,
            market_impact: crate::domain::types::MarketImpact::Neu,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_input_yields_neutral_result() {
        let now = Utc::now();
        let agg = Aggregator::new(AggregatorConfig::default(), Arc::new(FixedClock(now)));
        let out = agg.aggregate(&"MNQ".to_string(), &[], &HashMap::new());
        assert_eq!(out.composite_score, 0.0);
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.action, Action::Hold);
    }

    #[test]
    fn time_decay_ratio_matches_half_life() {
        let now = Utc::now();
        let o1 = obs(DataSource::MicroBlog, "t1", 1.0, 0, now);
        let o2 = obs(DataSource::MicroBlog, "t2", 1.0, 60, now);
        let mut scores = HashMap::new();
        scores.insert(o1.sentiment_key(), result(1.0, 1.0));
        scores.insert(o2.sentiment_key(), result(1.0, 1.0));

        let tw_0 = (-std::f64::consts::LN_2 * 0.0 / 30.0_f64).exp();
        let tw_60 = (-std::f64::consts::LN_2 * 60.0 / 30.0_f64).exp();
        assert!((tw_0 / tw_60 - 4.0).abs() < 1e-9);
    }

    #[test]
    fn cross_source_disagreement_yields_low_confidence_hold() {
        let now = Utc::now();
        let mut observations = Vec::new();
        let mut scores = HashMap::new();
        for i in 0..10 {
            let o = obs(DataSource::MicroBlog, &format!("pos{i}"), 0.5, 0, now);
            scores.insert(o.sentiment_key(), result(0.8, 0.9));
            observations.push(o);
        }
        for i in 0..10 {
            let o = obs(DataSource::News, &format!("neg{i}"), 0.5, 0, now);
            scores.insert(o.sentiment_key(), result(-0.8, 0.9));
            observations.push(o);
        }

        let config = AggregatorConfig {
            micro_blog_weight: 0.5,
            forum_weight: 0.0,
            news_weight: 0.5,
            ..AggregatorConfig::default()
        };
        let agg = Aggregator::new(config, Arc::new(FixedClock(now)));
        let out = agg.aggregate(&"MNQ".to_string(), &observations, &scores);

        assert!(out.composite_score.abs() < 0.05, "composite={}", out.composite_score);
        assert_eq!(out.action, Action::Hold);
    }

    #[test]
    fn action_is_hold_below_confidence_threshold_regardless_of_score() {
        let now = Utc::now();
        let mut observations = Vec::new();
        let mut scores = HashMap::new();
        // A single very strong observation still has low volume/agreement confidence.
        let o = obs(DataSource::News, "bullish", 0.9, 0, now);
        scores.insert(o.sentiment_key(), result(0.9, 0.9));
        observations.push(o);

        let agg = Aggregator::new(AggregatorConfig::default(), Arc::new(FixedClock(now)));
        let out = agg.aggregate(&"MNQ".to_string(), &observations, &scores);
        assert!(out.confidence < AggregatorConfig::default().confidence_threshold);
        assert_eq!(out.action, Action::Hold);
    }

    #[test]
    fn quick_aggregate_weighted_mean_matches_manual_calc() {
        let agg = Aggregator::new(AggregatorConfig::default(), Arc::new(FixedClock(Utc::now())));
        let (score, _confidence) = agg.quick_aggregate(&[(1.0, 1.0), (-1.0, 1.0)]);
        assert!(score.abs() < 1e-9);
    }

    #[test]
    fn quick_aggregate_empty_is_neutral() {
        let agg = Aggregator::new(AggregatorConfig::default(), Arc::new(FixedClock(Utc::now())));
        assert_eq!(agg.quick_aggregate(&[]), (0.0, 0.0));
    }
}
