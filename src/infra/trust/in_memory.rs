// In-memory implementation of TrustStore.
//
// Used by the `moderate` binary when no database path is configured. Nothing
// survives a restart.

use crate::core::trust::{
    clamp_trust_score, ScoreAdjustment, TrustError, TrustEvent, TrustRecord, TrustStore,
};
use async_trait::async_trait;
use dashmap::DashMap;

/// **DashMap:** a concurrent HashMap, so simultaneous moderation results for
/// different users never wait on a global lock.
#[derive(Default)]
pub struct InMemoryTrustStore {
    records: DashMap<u64, TrustRecord>,
    /// Per-user audit trail, oldest first
    events: DashMap<u64, Vec<TrustEvent>>,
}

impl InMemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrustStore for InMemoryTrustStore {
    async fn get_record(&self, user_id: u64) -> Result<Option<TrustRecord>, TrustError> {
        Ok(self.records.get(&user_id).map(|entry| entry.clone()))
    }

    async fn adjust_score(&self, adjustment: ScoreAdjustment) -> Result<TrustRecord, TrustError> {
        // The entry guard holds the user's shard until the event is logged,
        // so concurrent adjustments for one user apply one after another.
        let mut record = self
            .records
            .entry(adjustment.user_id)
            .or_insert_with(|| TrustRecord::new_user(adjustment.user_id));
        record.score = clamp_trust_score(record.score as i64 + adjustment.delta as i64);
        record.updated_at = adjustment.timestamp;

        self.events
            .entry(adjustment.user_id)
            .or_default()
            .push(TrustEvent {
                user_id: adjustment.user_id,
                delta: adjustment.delta,
                resulting_score: record.score,
                violations: adjustment.violations,
                timestamp: adjustment.timestamp,
            });

        Ok(record.clone())
    }

    async fn get_events(&self, user_id: u64, limit: usize) -> Result<Vec<TrustEvent>, TrustError> {
        Ok(self
            .events
            .get(&user_id)
            .map(|events| events.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_record(&self, user_id: u64) -> Result<(), TrustError> {
        self.records.remove(&user_id);
        Ok(())
    }
}
