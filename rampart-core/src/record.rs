//! Data model for attempt aggregation and access history.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{AttemptContext, ClientIdentity};

/// One diagnostic item appended to a record per failed retry.
///
/// Context accumulates as an ordered sequence instead of a concatenated
/// string, so nothing is lost across retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub occurred_at: DateTime<Utc>,
    pub path: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub extra: Option<serde_json::Value>,
}

impl ContextEntry {
    pub fn from_context(ctx: &AttemptContext, occurred_at: DateTime<Utc>) -> Self {
        Self {
            occurred_at,
            path: ctx.path.clone(),
            user_agent: ctx.user_agent.clone(),
            ip_address: ctx.ip_address,
            extra: ctx.extra.clone(),
        }
    }
}

/// Aggregated failure state for one identity within one window.
///
/// At most one active record exists per identity; a record is active while
/// `last_attempt_time` is within the cooldown period of now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub identity: ClientIdentity,
    /// Signals as first observed. Attackers vary these across retries to
    /// evade detection, so updates must never overwrite them.
    pub username: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
    /// Monotonically non-decreasing within a window.
    pub failure_count: u32,
    pub window_start: DateTime<Utc>,
    pub last_attempt_time: DateTime<Utc>,
    /// Append-only diagnostic trail, one entry per failure.
    pub context: Vec<ContextEntry>,
}

impl AttemptRecord {
    /// Fresh record for the first failure of a window.
    pub fn first_failure(
        identity: ClientIdentity,
        ctx: &AttemptContext,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            username: ctx.username.clone(),
            ip_address: ctx.ip_address,
            user_agent: ctx.user_agent.clone(),
            path: ctx.path.clone(),
            failure_count: 1,
            window_start: at,
            last_attempt_time: at,
            context: vec![ContextEntry::from_context(ctx, at)],
        }
    }

    /// Register another failure in place: bump the count, refresh the
    /// timestamp, append context. Original identity signals stay untouched.
    pub fn register_failure(&mut self, ctx: &AttemptContext, at: DateTime<Utc>) -> u32 {
        self.failure_count += 1;
        self.last_attempt_time = at;
        self.context.push(ContextEntry::from_context(ctx, at));
        self.failure_count
    }

    /// Whether this record still belongs to the active window.
    pub fn is_active(&self, active_since: DateTime<Utc>) -> bool {
        self.last_attempt_time >= active_since
    }
}

/// Tagged result of an atomic upsert-increment against the attempt store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No active record existed; a fresh one was created with count 1.
    Created { failure_count: u32 },
    /// An active record was incremented in place.
    Updated { failure_count: u32 },
}

impl UpsertOutcome {
    pub fn failure_count(&self) -> u32 {
        match self {
            Self::Created { failure_count } | Self::Updated { failure_count } => *failure_count,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// History of a successful login, later patched with a logout time.
///
/// Append-only: a logout stamps `logout_time` on the matching open event
/// but never touches its identity fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub username: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub path: Option<String>,
    pub login_time: DateTime<Utc>,
    pub logout_time: Option<DateTime<Utc>>,
    pub trusted: bool,
}

impl AccessEvent {
    /// Event for a successful login at `at`.
    pub fn login(ctx: &AttemptContext, at: DateTime<Utc>) -> Self {
        Self {
            username: ctx.username.clone(),
            ip_address: ctx.ip_address,
            user_agent: ctx.user_agent.clone(),
            path: ctx.path.clone(),
            login_time: at,
            logout_time: None,
            trusted: true,
        }
    }

    /// An open event has not been stamped with a logout yet.
    pub fn is_open(&self) -> bool {
        self.logout_time.is_none()
    }
}
