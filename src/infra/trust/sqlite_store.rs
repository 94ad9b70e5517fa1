// SQLite-backed trust store for persistent trust scores.
//
// Tables:
// - trust_scores: Current score per user
// - trust_events: Audit trail of every applied adjustment

use crate::core::trust::{
    clamp_trust_score, ScoreAdjustment, TrustError, TrustEvent, TrustRecord, TrustStore,
    INITIAL_TRUST_SCORE, MAX_TRUST_SCORE, MIN_TRUST_SCORE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

pub struct SqliteTrustStore {
    pool: SqlitePool,
}

impl SqliteTrustStore {
    /// Open (or create) the trust database at the given path.
    pub async fn new(database_path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = std::path::Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite://{}?mode=rwc", database_path))
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// A throwaway in-memory database. One connection, since every SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create tables.
    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trust_scores (
                user_id INTEGER PRIMARY KEY,
                score INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trust_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                delta INTEGER NOT NULL,
                resulting_score INTEGER NOT NULL,
                violations TEXT NOT NULL DEFAULT '[]',
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trust_events_user
            ON trust_events(user_id, id DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Timestamps are written as RFC3339. An unreadable one is logged and
    /// replaced with the current time rather than failing the whole read.
    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        match DateTime::parse_from_rfc3339(value) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(value, "Corrupt timestamp in trust database: {}", e);
                Utc::now()
            }
        }
    }
}

#[async_trait]
impl TrustStore for SqliteTrustStore {
    async fn get_record(&self, user_id: u64) -> Result<Option<TrustRecord>, TrustError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, score, updated_at
            FROM trust_scores
            WHERE user_id = ?
            "#,
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TrustError::StorageError(e.to_string()))?;

        Ok(row.map(|row| {
            let updated_at: String = row.get("updated_at");
            TrustRecord {
                user_id: row.get::<i64, _>("user_id") as u64,
                score: row.get::<i64, _>("score") as i32,
                updated_at: Self::parse_timestamp(&updated_at),
            }
        }))
    }

    async fn adjust_score(&self, adjustment: ScoreAdjustment) -> Result<TrustRecord, TrustError> {
        let violations = serde_json::to_string(&adjustment.violations)
            .map_err(|e| TrustError::StorageError(e.to_string()))?;
        let updated_at = adjustment.timestamp.to_rfc3339();
        let first_score =
            clamp_trust_score(INITIAL_TRUST_SCORE as i64 + adjustment.delta as i64);

        // Score and audit entry commit together. The upsert is the first
        // statement, so each transaction takes the write lock up front.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TrustError::StorageError(e.to_string()))?;

        let row = sqlx::query(
            r#"
            INSERT INTO trust_scores (user_id, score, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                score = MAX(?, MIN(?, trust_scores.score + ?)),
                updated_at = excluded.updated_at
            RETURNING score
            "#,
        )
        .bind(adjustment.user_id as i64)
        .bind(first_score as i64)
        .bind(updated_at.clone())
        .bind(MIN_TRUST_SCORE as i64)
        .bind(MAX_TRUST_SCORE as i64)
        .bind(adjustment.delta as i64)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| TrustError::StorageError(e.to_string()))?;
        let score = row.get::<i64, _>("score") as i32;

        sqlx::query(
            r#"
            INSERT INTO trust_events (user_id, delta, resulting_score, violations, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(adjustment.user_id as i64)
        .bind(adjustment.delta as i64)
        .bind(score as i64)
        .bind(violations)
        .bind(updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| TrustError::StorageError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| TrustError::StorageError(e.to_string()))?;

        Ok(TrustRecord {
            user_id: adjustment.user_id,
            score,
            updated_at: adjustment.timestamp,
        })
    }

    async fn get_events(&self, user_id: u64, limit: usize) -> Result<Vec<TrustEvent>, TrustError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, delta, resulting_score, violations, timestamp
            FROM trust_events
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TrustError::StorageError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let violations: String = row.get("violations");
                let timestamp: String = row.get("timestamp");
                Ok(TrustEvent {
                    user_id: row.get::<i64, _>("user_id") as u64,
                    delta: row.get::<i64, _>("delta") as i32,
                    resulting_score: row.get::<i64, _>("resulting_score") as i32,
                    violations: serde_json::from_str(&violations)
                        .map_err(|e| TrustError::StorageError(e.to_string()))?,
                    timestamp: Self::parse_timestamp(&timestamp),
                })
            })
            .collect()
    }

    async fn delete_record(&self, user_id: u64) -> Result<(), TrustError> {
        sqlx::query("DELETE FROM trust_scores WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| TrustError::StorageError(e.to_string()))?;
        Ok(())
    }
}
