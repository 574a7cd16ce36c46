//! `Journal` port implementation: a trade blotter and sentiment log
//! backed by SQLite.

use crate::domain::ports::Journal;
use crate::domain::types::{
    Action, AggregatedSentiment, DailyPerformance, JournalStatistics, TradeRecord,
};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

pub struct SqlJournal {
    db: Database,
}

impl SqlJournal {
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::new(db_url).await?;
        let journal = Self { db };
        journal.init().await?;
        Ok(journal)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                qty INTEGER NOT NULL,
                entry_price TEXT NOT NULL,
                stop_price TEXT NOT NULL,
                target_price TEXT NOT NULL,
                confidence REAL NOT NULL,
                sentiment_score REAL NOT NULL,
                reasoning TEXT NOT NULL,
                opened_at TEXT NOT NULL,
                exit_price TEXT,
                realized_pnl TEXT,
                closed_at TEXT
            );
            "#,
        )
        .execute(&self.db.pool)
        .await
        .context("failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trades_opened_at ON trades (opened_at);
            "#,
        )
        .execute(&self.db.pool)
        .await
        .context("failed to create trades index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sentiment_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                composite_score REAL NOT NULL,
                confidence REAL NOT NULL,
                action TEXT NOT NULL,
                data_points INTEGER NOT NULL,
                window_minutes INTEGER NOT NULL,
                themes_json TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.db.pool)
        .await
        .context("failed to create sentiment_log table")?;

        info!("journal schema initialized");
        Ok(())
    }
}

fn action_to_str(action: Action) -> &'static str {
    match action {
        Action::Buy => "Buy",
        Action::Sell => "Sell",
        Action::Hold => "Hold",
    }
}

fn action_from_str(s: &str) -> Action {
    match s {
        "Buy" => Action::Buy,
        "Sell" => Action::Sell,
        _ => Action::Hold,
    }
}

#[async_trait]
impl Journal for SqlJournal {
    async fn record_trade(&self, trade: &TradeRecord) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO trades
                (symbol, action, qty, entry_price, stop_price, target_price,
                 confidence, sentiment_score, reasoning, opened_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&trade.symbol)
        .bind(action_to_str(trade.action))
        .bind(trade.qty as i64)
        .bind(trade.entry_price.to_string())
        .bind(trade.stop_price.to_string())
        .bind(trade.target_price.to_string())
        .bind(trade.confidence)
        .bind(trade.sentiment_score)
        .bind(&trade.reasoning)
        .bind(trade.opened_at.to_rfc3339())
        .fetch_one(&self.db.pool)
        .await
        .context("failed to insert trade")?;

        Ok(row.get::<i64, _>("id"))
    }

    async fn update_trade_exit(
        &self,
        trade_id: i64,
        exit_price: Decimal,
        realized_pnl: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trades
            SET exit_price = ?, realized_pnl = ?, closed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(exit_price.to_string())
        .bind(realized_pnl.to_string())
        .bind(closed_at.to_rfc3339())
        .bind(trade_id)
        .execute(&self.db.pool)
        .await
        .context("failed to update trade exit")?;

        Ok(())
    }

    async fn record_sentiment(&self, sentiment: &AggregatedSentiment) -> Result<()> {
        let themes_json = serde_json::to_string(&sentiment.themes).unwrap_or_default();
        sqlx::query(
            r#"
            INSERT INTO sentiment_log
                (symbol, composite_score, confidence, action, data_points,
                 window_minutes, themes_json, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sentiment.symbol)
        .bind(sentiment.composite_score)
        .bind(sentiment.confidence)
        .bind(action_to_str(sentiment.action))
        .bind(sentiment.data_points as i64)
        .bind(sentiment.window_minutes)
        .bind(themes_json)
        .bind(sentiment.timestamp.to_rfc3339())
        .execute(&self.db.pool)
        .await
        .context("failed to insert sentiment record")?;

        Ok(())
    }

    async fn get_daily_performance(&self, date: NaiveDate) -> Result<DailyPerformance> {
        let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc().to_rfc3339();
        let end = (date + chrono::Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .to_rfc3339();

        let rows = sqlx::query(
            r#"
            SELECT realized_pnl FROM trades
            WHERE closed_at IS NOT NULL AND closed_at >= ? AND closed_at < ?
            "#,
        )
        .bind(&start)
        .bind(&end)
        .fetch_all(&self.db.pool)
        .await
        .context("failed to query daily performance")?;

        let mut trades = 0u32;
        let mut wins = 0u32;
        let mut losses = 0u32;
        let mut realized_pnl = Decimal::ZERO;

        for row in rows {
            let pnl_str: Option<String> = row.get("realized_pnl");
            let pnl = pnl_str.and_then(|s| Decimal::from_str(&s).ok()).unwrap_or(Decimal::ZERO);
            trades += 1;
            realized_pnl += pnl;
            if pnl.is_sign_positive() && !pnl.is_zero() {
                wins += 1;
            } else if pnl.is_sign_negative() {
                losses += 1;
            }
        }

        Ok(DailyPerformance { date, trades, wins, losses, realized_pnl })
    }

    async fn get_statistics(&self) -> Result<JournalStatistics> {
        let rows = sqlx::query(
            r#"
            SELECT realized_pnl FROM trades WHERE closed_at IS NOT NULL
            "#,
        )
        .fetch_all(&self.db.pool)
        .await
        .context("failed to query journal statistics")?;

        let mut total_trades = 0u64;
        let mut wins = 0u64;
        let mut win_sum = Decimal::ZERO;
        let mut loss_sum = Decimal::ZERO;
        let mut loss_count = 0u64;
        let mut total_realized_pnl = Decimal::ZERO;

        for row in rows {
            let pnl_str: Option<String> = row.get("realized_pnl");
            let pnl = pnl_str.and_then(|s| Decimal::from_str(&s).ok()).unwrap_or(Decimal::ZERO);
            total_trades += 1;
            total_realized_pnl += pnl;
            if pnl.is_sign_positive() && !pnl.is_zero() {
                wins += 1;
                win_sum += pnl;
            } else if pnl.is_sign_negative() {
                loss_count += 1;
                loss_sum += pnl;
            }
        }

        let win_rate = if total_trades > 0 { wins as f64 / total_trades as f64 } else { 0.0 };
        let avg_win = if wins > 0 { win_sum / Decimal::from(wins) } else { Decimal::ZERO };
        let avg_loss = if loss_count > 0 { loss_sum / Decimal::from(loss_count) } else { Decimal::ZERO };

        Ok(JournalStatistics { total_trades, win_rate, avg_win, avg_loss, total_realized_pnl })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_closes_a_trade_roundtrip() {
        let journal = SqlJournal::new("sqlite::memory:").await.unwrap();
        let trade = TradeRecord {
            id: None,
            symbol: "MNQ".to_string(),
            action: Action::Buy,
            qty: 1,
            entry_price: Decimal::new(1800000, 2),
            stop_price: Decimal::new(1798650, 2),
            target_price: Decimal::new(1801800, 2),
            confidence: 0.8,
            sentiment_score: 0.3,
            reasoning: "golden cross".to_string(),
            opened_at: Utc::now(),
            exit_price: None,
            realized_pnl: None,
            closed_at: None,
        };

        let id = journal.record_trade(&trade).await.unwrap();
        assert!(id > 0);

        journal
            .update_trade_exit(id, Decimal::new(1801800, 2), Decimal::new(1800, 2), Utc::now())
            .await
            .unwrap();

        let stats = journal.get_statistics().await.unwrap();
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.win_rate, 1.0);
    }

    #[tokio::test]
    async fn daily_performance_aggregates_only_closed_trades_for_the_date() {
        let journal = SqlJournal::new("sqlite::memory:").await.unwrap();
        let today = Utc::now().date_naive();
        let performance = journal.get_daily_performance(today).await.unwrap();
        assert_eq!(performance.trades, 0);
        assert_eq!(performance.realized_pnl, Decimal::ZERO);
    }

    #[tokio::test]
    async fn record_sentiment_does_not_error() {
        let journal = SqlJournal::new("sqlite::memory:").await.unwrap();
        let sentiment = AggregatedSentiment::empty("MNQ".to_string(), 60);
        journal.record_sentiment(&sentiment).await.unwrap();
    }

    #[test]
    fn action_roundtrips_through_its_string_encoding() {
        assert_eq!(action_from_str(action_to_str(Action::Sell)), Action::Sell);
        assert_eq!(action_from_str(action_to_str(Action::Buy)), Action::Buy);
        assert_eq!(action_from_str(action_to_str(Action::Hold)), Action::Hold);
    }
}
