//! Repository trait for aggregated failure records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    identity::{AttemptContext, ClientIdentity},
    record::{AttemptRecord, UpsertOutcome},
};

/// Storage for [`AttemptRecord`]s, keyed by identity and time window.
///
/// # Concurrency
///
/// The store is shared mutable state: failures for the same identity arrive
/// from parallel requests. `upsert_increment` must be atomic per identity —
/// the existence check and the insert-or-increment have to share one
/// critical section, otherwise two concurrent failures can both observe the
/// same count and drop an increment (or create two fresh records). Relying
/// on single-row update atomicity alone is not enough, because the
/// create-vs-update branch reintroduces the race.
///
/// Sweeping compares each record's `last_attempt_time` against the supplied
/// cutoff at removal time, never against a snapshot taken before the sweep
/// started, so a record refreshed by a concurrent increment survives.
#[async_trait]
pub trait AttemptRepository: Send + Sync + 'static {
    /// Find the identity's active record, if any.
    ///
    /// A record is active when its `last_attempt_time` is at or after
    /// `active_since`. When several stored windows could match, the most
    /// recently updated one wins; windows are never aggregated together.
    async fn find_active(
        &self,
        identity: &ClientIdentity,
        active_since: DateTime<Utc>,
    ) -> Result<Option<AttemptRecord>, Error>;

    /// Atomically record one failure for the identity.
    ///
    /// If an active record exists, increment its count in place, refresh
    /// `last_attempt_time` to `as_of`, and append a context entry — without
    /// overwriting the originally recorded username/address/user-agent. If
    /// none exists (or only a stale one), create a fresh record with count 1.
    async fn upsert_increment(
        &self,
        identity: &ClientIdentity,
        context: &AttemptContext,
        as_of: DateTime<Utc>,
        active_since: DateTime<Utc>,
    ) -> Result<UpsertOutcome, Error>;

    /// Remove records whose `last_attempt_time` is before `expired_before`.
    /// Returns the number of records removed.
    async fn sweep_expired(&self, expired_before: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete the identity's record. Returns the number of failures cleared.
    async fn reset(&self, identity: &ClientIdentity) -> Result<u64, Error>;
}
