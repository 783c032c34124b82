//! In-memory storage backend for rampart.
//!
//! Implements [`AttemptRepository`] and [`AccessLogRepository`] on a
//! concurrent map. Suitable for single-process deployments and tests; the
//! state is not shared across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;

use rampart_core::{
    AccessEvent, AttemptContext, AttemptRecord, ClientIdentity, Error, UpsertOutcome,
    repositories::{AccessLogRepository, AttemptRepository},
};

/// In-memory repository for attempt records and access history.
///
/// The attempt map's entry guard holds a per-shard lock, which makes the
/// existence check and the insert-or-increment of `upsert_increment` a
/// single critical section per identity.
#[derive(Default)]
pub struct MemoryRepository {
    attempts: DashMap<ClientIdentity, AttemptRecord>,
    access_log: RwLock<Vec<AccessEvent>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempt records currently held, active or not.
    pub fn attempt_record_count(&self) -> usize {
        self.attempts.len()
    }

    /// Snapshot of the access history, oldest first.
    pub async fn access_events(&self) -> Vec<AccessEvent> {
        self.access_log.read().await.clone()
    }
}

#[async_trait]
impl AttemptRepository for MemoryRepository {
    async fn find_active(
        &self,
        identity: &ClientIdentity,
        active_since: DateTime<Utc>,
    ) -> Result<Option<AttemptRecord>, Error> {
        match self.attempts.get(identity) {
            Some(record) if record.is_active(active_since) => Ok(Some(record.value().clone())),
            _ => Ok(None),
        }
    }

    async fn upsert_increment(
        &self,
        identity: &ClientIdentity,
        context: &AttemptContext,
        as_of: DateTime<Utc>,
        active_since: DateTime<Utc>,
    ) -> Result<UpsertOutcome, Error> {
        let outcome = match self.attempts.entry(identity.clone()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.is_active(active_since) {
                    let count = record.register_failure(context, as_of);
                    UpsertOutcome::Updated {
                        failure_count: count,
                    }
                } else {
                    // The previous window expired and a sweep has not
                    // removed it yet; start a fresh window.
                    *record = AttemptRecord::first_failure(identity.clone(), context, as_of);
                    UpsertOutcome::Created { failure_count: 1 }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(AttemptRecord::first_failure(identity.clone(), context, as_of));
                UpsertOutcome::Created { failure_count: 1 }
            }
        };
        Ok(outcome)
    }

    async fn sweep_expired(&self, expired_before: DateTime<Utc>) -> Result<u64, Error> {
        let before = self.attempts.len();
        // retain re-reads each record's timestamp under the shard lock, so a
        // record refreshed by a concurrent increment is kept.
        self.attempts
            .retain(|_, record| record.last_attempt_time >= expired_before);
        let removed = before.saturating_sub(self.attempts.len()) as u64;
        if removed > 0 {
            tracing::debug!(removed, "Swept expired attempt records");
        }
        Ok(removed)
    }

    async fn reset(&self, identity: &ClientIdentity) -> Result<u64, Error> {
        Ok(self
            .attempts
            .remove(identity)
            .map(|(_, record)| u64::from(record.failure_count))
            .unwrap_or(0))
    }
}

#[async_trait]
impl AccessLogRepository for MemoryRepository {
    async fn record_login(&self, event: AccessEvent) -> Result<(), Error> {
        self.access_log.write().await.push(event);
        Ok(())
    }

    async fn stamp_logout(
        &self,
        username: &str,
        logout_time: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let mut log = self.access_log.write().await;
        // Most recent open login for the username wins.
        for event in log.iter_mut().rev() {
            if event.username.as_deref() == Some(username) && event.is_open() {
                event.logout_time = Some(logout_time);
                return Ok(1);
            }
        }
        Ok(0)
    }
}
