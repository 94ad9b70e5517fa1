// Trust ledger - applies moderation deltas to a user's stored trust score.
//
// The trust-score policy only computes a delta and never clamps it. This is
// the caller side of that contract: it owns the stored score, keeps it within
// [MIN_TRUST_SCORE, MAX_TRUST_SCORE], and records every adjustment.

use crate::core::moderation::{calculate_trust_score_adjustment, Violation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Score every user starts with.
pub const INITIAL_TRUST_SCORE: i32 = 100;
pub const MIN_TRUST_SCORE: i32 = 0;
pub const MAX_TRUST_SCORE: i32 = 100;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A user's current trust score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRecord {
    pub user_id: u64,
    pub score: i32,
    pub updated_at: DateTime<Utc>,
}

impl TrustRecord {
    /// Record for a user we've never seen before.
    pub fn new_user(user_id: u64) -> Self {
        Self {
            user_id,
            score: INITIAL_TRUST_SCORE,
            updated_at: Utc::now(),
        }
    }
}

/// Audit entry for one applied adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEvent {
    pub user_id: u64,
    /// Delta as computed by the policy (unclamped)
    pub delta: i32,
    /// Score after clamping
    pub resulting_score: i32,
    /// Labels of the violations that caused it
    pub violations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Clamp a raw score into [MIN_TRUST_SCORE, MAX_TRUST_SCORE].
pub fn clamp_trust_score(score: i64) -> i32 {
    score.clamp(MIN_TRUST_SCORE as i64, MAX_TRUST_SCORE as i64) as i32
}

/// One adjustment to apply to a user's stored score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreAdjustment {
    pub user_id: u64,
    /// Delta as computed by the policy (unclamped)
    pub delta: i32,
    pub violations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trait for persisting trust scores.
///
/// Same split as the rest of the core: in-memory for tests, SQLite for the binary.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Get a user's record, or `None` if they have never been scored.
    async fn get_record(&self, user_id: u64) -> Result<Option<TrustRecord>, TrustError>;

    /// Add the delta to the user's score (new users start at
    /// `INITIAL_TRUST_SCORE`), clamp it, and append the audit entry.
    ///
    /// Must be atomic per user: concurrent adjustments all land, and the score
    /// never changes without its audit entry.
    async fn adjust_score(&self, adjustment: ScoreAdjustment) -> Result<TrustRecord, TrustError>;

    /// Most recent audit entries for a user, newest first.
    async fn get_events(&self, user_id: u64, limit: usize) -> Result<Vec<TrustEvent>, TrustError>;

    /// Forget a user's record (their history stays).
    async fn delete_record(&self, user_id: u64) -> Result<(), TrustError>;
}

// Blanket implementation for Box<dyn TrustStore>
// This lets the composition root pick SQLite or in-memory at runtime.
#[async_trait]
impl TrustStore for Box<dyn TrustStore> {
    async fn get_record(&self, user_id: u64) -> Result<Option<TrustRecord>, TrustError> {
        (**self).get_record(user_id).await
    }

    async fn adjust_score(&self, adjustment: ScoreAdjustment) -> Result<TrustRecord, TrustError> {
        (**self).adjust_score(adjustment).await
    }

    async fn get_events(&self, user_id: u64, limit: usize) -> Result<Vec<TrustEvent>, TrustError> {
        (**self).get_events(user_id, limit).await
    }

    async fn delete_record(&self, user_id: u64) -> Result<(), TrustError> {
        (**self).delete_record(user_id).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct TrustScoreService<S: TrustStore> {
    store: S,
}

impl<S: TrustStore> TrustScoreService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current score for a user (new users start at `INITIAL_TRUST_SCORE`).
    pub async fn get_score(&self, user_id: u64) -> Result<i32, TrustError> {
        Ok(self
            .store
            .get_record(user_id)
            .await?
            .map(|r| r.score)
            .unwrap_or(INITIAL_TRUST_SCORE))
    }

    /// Price a batch of violations with the trust-score policy and apply it.
    pub async fn apply_violations(
        &self,
        user_id: u64,
        violations: &[Violation],
    ) -> Result<TrustRecord, TrustError> {
        let delta = calculate_trust_score_adjustment(violations);
        let labels = violations.iter().map(|v| v.label().to_string()).collect();
        self.apply_adjustment(user_id, delta, labels).await
    }

    /// Apply an already computed delta, clamping the stored score.
    ///
    /// A zero delta on a clean batch is a no-op and leaves no audit entry.
    pub async fn apply_adjustment(
        &self,
        user_id: u64,
        delta: i32,
        violations: Vec<String>,
    ) -> Result<TrustRecord, TrustError> {
        if delta == 0 && violations.is_empty() {
            return Ok(self
                .store
                .get_record(user_id)
                .await?
                .unwrap_or_else(|| TrustRecord::new_user(user_id)));
        }

        let record = self
            .store
            .adjust_score(ScoreAdjustment {
                user_id,
                delta,
                violations,
                timestamp: Utc::now(),
            })
            .await?;

        if delta != 0 {
            tracing::info!(
                user_id,
                delta,
                score = record.score,
                "Applied trust score adjustment"
            );
        }

        Ok(record)
    }

    /// Recent adjustments for a user, newest first.
    pub async fn history(&self, user_id: u64, limit: usize) -> Result<Vec<TrustEvent>, TrustError> {
        self.store.get_events(user_id, limit).await
    }

    /// Reset a user back to the initial score (admin action).
    pub async fn reset(&self, user_id: u64) -> Result<(), TrustError> {
        self.store.delete_record(user_id).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
