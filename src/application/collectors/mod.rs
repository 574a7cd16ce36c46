//! Per-source textual-signal collectors. Every
//! collector implements `domain::ports::Collector`; all failures are
//! contained — a failing fetch logs and returns an empty list, never
//! aborting the pipeline.

pub mod forum;
pub mod microblog;
pub mod news;

use crate::domain::types::SymbolProfile;
use std::collections::HashMap;

/// Static per-symbol search-term table. Falls back to `[symbol]` for
/// an unknown symbol.
pub struct SymbolProfiles {
    table: HashMap<String, SymbolProfile>,
}

impl SymbolProfiles {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        table.insert(
            "MNQ".to_string(),
            SymbolProfile {
                symbol: "MNQ".to_string(),
                display_name: "Micro E-mini Nasdaq-100".to_string(),
                micro_blog_terms: vec!["$NQ".to_string(), "Nasdaq futures".to_string()],
                forum_terms: vec!["NQ futures".to_string(), "Nasdaq".to_string()],
                news_terms: vec!["Nasdaq 100".to_string(), "tech stocks".to_string()],
            },
        );
        table.insert(
            "MES".to_string(),
            SymbolProfile {
                symbol: "MES".to_string(),
                display_name: "Micro E-mini S&P 500".to_string(),
                micro_blog_terms: vec!["$ES".to_string(), "S&P futures".to_string()],
                forum_terms: vec!["ES futures".to_string(), "S&P 500".to_string()],
                news_terms: vec!["S&P 500".to_string(), "stock market".to_string()],
            },
        );
        table.insert(
            "MYM".to_string(),
            SymbolProfile {
                symbol: "MYM".to_string(),
                display_name: "Micro E-mini Dow".to_string(),
                micro_blog_terms: vec!["$YM".to_string(), "Dow futures".to_string()],
                forum_terms: vec!["YM futures".to_string(), "Dow Jones".to_string()],
                news_terms: vec!["Dow Jones".to_string()],
            },
        );
        SymbolProfiles { table }
    }

    pub fn lookup(&self, symbol: &str) -> SymbolProfile {
        self.table
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| SymbolProfile::fallback(symbol))
    }
}

impl Default for SymbolProfiles {
    fn default() -> Self {
        Self::new()
    }
}

/// `log1p(x)/scale`, clamped to `[0, 1]`. Shared engagement-score shape
/// used by the micro-blog and forum collectors.
pub(crate) fn log1p_engagement(x: f64, scale: f64) -> f64 {
    (x.max(0.0).ln_1p() / scale).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_symbol_falls_back_to_symbol_itself() {
        let profiles = SymbolProfiles::new();
        let profile = profiles.lookup("ZZZZ");
        assert_eq!(profile.micro_blog_terms, vec!["ZZZZ".to_string()]);
        assert_eq!(profile.forum_terms, vec!["ZZZZ".to_string()]);
        assert_eq!(profile.news_terms, vec!["ZZZZ".to_string()]);
    }

    #[test]
    fn log1p_engagement_is_clamped() {
        assert!(log1p_engagement(-5.0, 10.0) >= 0.0);
        assert!(log1p_engagement(1e9, 1.0) <= 1.0);
    }
}
