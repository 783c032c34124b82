//! Lockout decision engine.
//!
//! Tracks failed authentication attempts per client identity and decides
//! when further attempts must be denied.
//!
//! # Example
//!
//! ```rust,ignore
//! use rampart_core::{AttemptContext, Decision, LockoutEngine};
//!
//! let decision = engine.record_failure(&ctx).await?;
//! match decision {
//!     Decision::LockedOut { .. } => {
//!         // Hard denial: do not run any further authentication step.
//!     }
//!     Decision::Recorded { .. } | Decision::Allow => {
//!         // Authentication proceeds and may still fail on its own.
//!     }
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error,
    config::LockoutConfig,
    error::IdentityError,
    events::{Event, EventBus},
    identity::AttemptContext,
    record::{ContextEntry, UpsertOutcome},
    repositories::AttemptRepository,
    whitelist::WhitelistPolicy,
};

/// Outcome of recording a failed attempt.
///
/// A typed result rather than exception control flow: the caller matches on
/// it and treats `LockedOut` as a hard authorization denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The attempt was not tracked: the client is whitelisted, or the
    /// context could not be attributed to an identity.
    Allow,
    /// The failure was recorded below the limit. Authentication proceeds
    /// and may fail normally ("bad password" rather than "locked out").
    Recorded { failure_count: u32 },
    /// The failure limit was crossed. The caller must deny the attempt and
    /// run no further authentication step.
    LockedOut { failure_count: u32 },
}

/// Engine deciding, one failure event at a time, whether a client identity
/// has exhausted its failure budget.
///
/// # Thread safety
///
/// The engine is shared across concurrent attempts. It keeps no mutable
/// state of its own; the repository's atomic `upsert_increment` carries the
/// count-then-lock transition (see [`AttemptRepository`]).
pub struct LockoutEngine<R: AttemptRepository> {
    attempts: Arc<R>,
    whitelist: Arc<dyn WhitelistPolicy>,
    events: EventBus,
    config: LockoutConfig,
}

impl<R: AttemptRepository> LockoutEngine<R> {
    /// Create an engine. Fails when the configuration is invalid
    /// (zero failure limit or non-positive cooldown).
    pub fn new(
        attempts: Arc<R>,
        whitelist: Arc<dyn WhitelistPolicy>,
        events: EventBus,
        config: LockoutConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            attempts,
            whitelist,
            events,
            config,
        })
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Record one failed attempt and decide whether the client is locked out.
    ///
    /// The authentication layer must call this exactly once per failed
    /// attempt. Flow: sweep expired records, short-circuit whitelisted
    /// clients, resolve the identity, atomically upsert-increment the
    /// failure count, then check the limit. Crossing the limit publishes
    /// [`Event::LockedOut`] and returns [`Decision::LockedOut`]
    /// synchronously, before this method returns, so the caller cannot
    /// answer the attempt with a success.
    ///
    /// An unattributable context (no usable signals) is logged and returns
    /// [`Decision::Allow`]: tracking fails open, authorization does not —
    /// the underlying credential check still runs.
    pub async fn record_failure(&self, ctx: &AttemptContext) -> Result<Decision, Error> {
        let as_of = Utc::now();
        let active_since = self.config.active_since(as_of);

        // Stale records must be gone before the count is read, otherwise an
        // expired window would extend a lockout.
        self.attempts.sweep_expired(active_since).await?;

        if self.whitelist.is_exempt(ctx) {
            if self.config.log_whitelisted {
                tracing::info!(client = %ctx, "Login failed from whitelisted client");
            }
            return Ok(Decision::Allow);
        }

        let identity = match self.config.identification_policy.resolve(ctx) {
            Ok(identity) => identity,
            Err(IdentityError::MissingContext) => {
                // Cannot attribute the failure to anyone; decline to track
                // rather than fail the attempt.
                tracing::error!("Login failure carries no identification signal, not tracking");
                return Ok(Decision::Allow);
            }
        };

        let outcome = self
            .attempts
            .upsert_increment(&identity, ctx, as_of, active_since)
            .await?;
        let failure_count = outcome.failure_count();

        match outcome {
            UpsertOutcome::Created { .. } => {
                tracing::warn!(identity = %identity, "New login failure, creating attempt record");
            }
            UpsertOutcome::Updated { .. } => {
                tracing::warn!(
                    identity = %identity,
                    count = failure_count,
                    limit = self.config.failure_limit,
                    "Repeated login failure, updating attempt record"
                );
            }
        }

        if failure_count >= self.config.failure_limit {
            tracing::warn!(
                identity = %identity,
                count = failure_count,
                "Locking out client after repeated login failures"
            );
            self.events
                .publish(&Event::LockedOut {
                    identity: identity.clone(),
                    failure_count,
                    context: ContextEntry::from_context(ctx, as_of),
                    timestamp: as_of,
                })
                .await;
            return Ok(Decision::LockedOut { failure_count });
        }

        Ok(Decision::Recorded { failure_count })
    }

    /// Read-only check, usable before running the credential check itself.
    /// Whitelisted clients are never locked; unresolvable contexts report
    /// unlocked.
    pub async fn is_locked(&self, ctx: &AttemptContext) -> Result<bool, Error> {
        if self.whitelist.is_exempt(ctx) {
            return Ok(false);
        }
        Ok(self.failures(ctx).await? >= self.config.failure_limit)
    }

    /// Current failure count in the identity's active window (0 if none).
    pub async fn failures(&self, ctx: &AttemptContext) -> Result<u32, Error> {
        let as_of = Utc::now();
        let Ok(identity) = self.config.identification_policy.resolve(ctx) else {
            return Ok(0);
        };
        let record = self
            .attempts
            .find_active(&identity, self.config.active_since(as_of))
            .await?;
        Ok(record.map(|r| r.failure_count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{EventError, StorageError},
        events::EventHandler,
        identity::ClientIdentity,
        record::AttemptRecord,
        whitelist::{StaticWhitelist, WhitelistEntry},
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use std::collections::HashMap;
    use std::collections::hash_map::Entry;
    use std::sync::Mutex;

    /// Mock repository for testing
    struct MockAttemptRepository {
        records: Mutex<HashMap<ClientIdentity, AttemptRecord>>,
        fail_storage: bool,
    }

    impl MockAttemptRepository {
        fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                fail_storage: false,
            }
        }

        fn failing() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                fail_storage: true,
            }
        }
    }

    #[async_trait]
    impl AttemptRepository for MockAttemptRepository {
        async fn find_active(
            &self,
            identity: &ClientIdentity,
            active_since: DateTime<Utc>,
        ) -> Result<Option<AttemptRecord>, Error> {
            let records = self.records.lock().unwrap();
            Ok(records
                .get(identity)
                .filter(|r| r.is_active(active_since))
                .cloned())
        }

        async fn upsert_increment(
            &self,
            identity: &ClientIdentity,
            context: &AttemptContext,
            as_of: DateTime<Utc>,
            active_since: DateTime<Utc>,
        ) -> Result<UpsertOutcome, Error> {
            if self.fail_storage {
                return Err(StorageError::Unavailable("mock store down".to_string()).into());
            }
            let mut records = self.records.lock().unwrap();
            match records.entry(identity.clone()) {
                Entry::Occupied(mut occupied) if occupied.get().is_active(active_since) => {
                    let count = occupied.get_mut().register_failure(context, as_of);
                    Ok(UpsertOutcome::Updated {
                        failure_count: count,
                    })
                }
                Entry::Occupied(mut occupied) => {
                    occupied.insert(AttemptRecord::first_failure(
                        identity.clone(),
                        context,
                        as_of,
                    ));
                    Ok(UpsertOutcome::Created { failure_count: 1 })
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(AttemptRecord::first_failure(identity.clone(), context, as_of));
                    Ok(UpsertOutcome::Created { failure_count: 1 })
                }
            }
        }

        async fn sweep_expired(&self, expired_before: DateTime<Utc>) -> Result<u64, Error> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|_, r| r.last_attempt_time >= expired_before);
            Ok((before - records.len()) as u64)
        }

        async fn reset(&self, identity: &ClientIdentity) -> Result<u64, Error> {
            let mut records = self.records.lock().unwrap();
            Ok(records
                .remove(identity)
                .map(|r| u64::from(r.failure_count))
                .unwrap_or(0))
        }
    }

    struct RecordingHandler {
        events: Arc<Mutex<Vec<Event>>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn ctx(username: &str) -> AttemptContext {
        AttemptContext::new()
            .username(username)
            .ip_address("203.0.113.7".parse().unwrap())
            .user_agent("curl/8.0")
            .path("/login")
    }

    async fn engine(
        config: LockoutConfig,
    ) -> (
        LockoutEngine<MockAttemptRepository>,
        Arc<MockAttemptRepository>,
        Arc<Mutex<Vec<Event>>>,
    ) {
        let repo = Arc::new(MockAttemptRepository::new());
        let bus = EventBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        bus.register(Arc::new(RecordingHandler {
            events: events.clone(),
        }))
        .await;
        let engine = LockoutEngine::new(
            repo.clone(),
            Arc::new(StaticWhitelist::empty()),
            bus,
            config,
        )
        .unwrap();
        (engine, repo, events)
    }

    #[tokio::test]
    async fn test_failures_below_limit_are_recorded() {
        let (engine, repo, _) = engine(LockoutConfig {
            failure_limit: 3,
            ..LockoutConfig::default()
        })
        .await;

        assert_eq!(
            engine.record_failure(&ctx("mallory")).await.unwrap(),
            Decision::Recorded { failure_count: 1 }
        );
        assert_eq!(
            engine.record_failure(&ctx("mallory")).await.unwrap(),
            Decision::Recorded { failure_count: 2 }
        );

        // Exactly one record, count equal to the number of failures.
        let records = repo.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.values().next().unwrap().failure_count, 2);
    }

    #[tokio::test]
    async fn test_limit_crossing_locks_out_and_publishes() {
        let (engine, _, events) = engine(LockoutConfig {
            failure_limit: 3,
            ..LockoutConfig::default()
        })
        .await;

        engine.record_failure(&ctx("mallory")).await.unwrap();
        engine.record_failure(&ctx("mallory")).await.unwrap();
        let decision = engine.record_failure(&ctx("mallory")).await.unwrap();

        assert_eq!(decision, Decision::LockedOut { failure_count: 3 });

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::LockedOut {
                identity,
                failure_count,
                ..
            } => {
                assert_eq!(identity.username.as_deref(), Some("mallory"));
                assert_eq!(*failure_count, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lockout_persists_until_expiry() {
        let (engine, _, _) = engine(LockoutConfig {
            failure_limit: 2,
            ..LockoutConfig::default()
        })
        .await;

        engine.record_failure(&ctx("mallory")).await.unwrap();
        engine.record_failure(&ctx("mallory")).await.unwrap();

        // Every further attempt within the window stays locked out.
        for expected in 3..=5 {
            assert_eq!(
                engine.record_failure(&ctx("mallory")).await.unwrap(),
                Decision::LockedOut {
                    failure_count: expected
                }
            );
        }
        assert!(engine.is_locked(&ctx("mallory")).await.unwrap());
    }

    #[tokio::test]
    async fn test_whitelisted_client_never_locked_out() {
        let repo = Arc::new(MockAttemptRepository::new());
        let whitelist =
            StaticWhitelist::new(vec![WhitelistEntry::Username("mallory".to_string())]);
        let engine = LockoutEngine::new(
            repo.clone(),
            Arc::new(whitelist),
            EventBus::new(),
            LockoutConfig {
                failure_limit: 2,
                ..LockoutConfig::default()
            },
        )
        .unwrap();

        for _ in 0..10 {
            assert_eq!(
                engine.record_failure(&ctx("mallory")).await.unwrap(),
                Decision::Allow
            );
        }

        // No record was ever created or updated.
        assert!(repo.records.lock().unwrap().is_empty());
        assert!(!engine.is_locked(&ctx("mallory")).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_context_declines_to_track() {
        let (engine, repo, _) = engine(LockoutConfig::default()).await;

        let decision = engine.record_failure(&AttemptContext::new()).await.unwrap();
        assert_eq!(decision, Decision::Allow);
        assert!(repo.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_error_propagates() {
        let repo = Arc::new(MockAttemptRepository::failing());
        let engine = LockoutEngine::new(
            repo,
            Arc::new(StaticWhitelist::empty()),
            EventBus::new(),
            LockoutConfig::default(),
        )
        .unwrap();

        let result = engine.record_failure(&ctx("mallory")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().is_storage_error());
    }

    #[tokio::test]
    async fn test_stale_record_swept_before_counting() {
        let (engine, repo, _) = engine(LockoutConfig {
            failure_limit: 3,
            cooldown_period: Duration::minutes(30),
            ..LockoutConfig::default()
        })
        .await;

        // Plant a stale record: last attempt far outside the cooldown.
        let identity = engine
            .config()
            .identification_policy
            .resolve(&ctx("mallory"))
            .unwrap();
        let mut record = AttemptRecord::first_failure(identity.clone(), &ctx("mallory"), Utc::now());
        record.failure_count = 2;
        record.last_attempt_time = Utc::now() - Duration::hours(2);
        repo.records.lock().unwrap().insert(identity, record);

        // A new failure starts a fresh window at count 1, not an increment.
        assert_eq!(
            engine.record_failure(&ctx("mallory")).await.unwrap(),
            Decision::Recorded { failure_count: 1 }
        );
    }

    #[tokio::test]
    async fn test_anonymous_attempts_tracked_by_address() {
        let (engine, repo, _) = engine(LockoutConfig {
            failure_limit: 2,
            ..LockoutConfig::default()
        })
        .await;

        let anonymous = AttemptContext::new().ip_address("198.51.100.4".parse().unwrap());
        engine.record_failure(&anonymous).await.unwrap();
        let decision = engine.record_failure(&anonymous).await.unwrap();

        assert_eq!(decision, Decision::LockedOut { failure_count: 2 });
        assert_eq!(repo.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_separate_identities_tracked_separately() {
        let (engine, _, _) = engine(LockoutConfig {
            failure_limit: 2,
            ..LockoutConfig::default()
        })
        .await;

        engine.record_failure(&ctx("mallory")).await.unwrap();
        engine.record_failure(&ctx("mallory")).await.unwrap();

        assert!(engine.is_locked(&ctx("mallory")).await.unwrap());
        assert!(!engine.is_locked(&ctx("trent")).await.unwrap());
        assert_eq!(engine.failures(&ctx("trent")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_failure_limit_rejected_at_construction() {
        let repo = Arc::new(MockAttemptRepository::new());
        let result = LockoutEngine::new(
            repo,
            Arc::new(StaticWhitelist::empty()),
            EventBus::new(),
            LockoutConfig {
                failure_limit: 0,
                ..LockoutConfig::default()
            },
        );
        assert!(result.is_err());
    }
}
