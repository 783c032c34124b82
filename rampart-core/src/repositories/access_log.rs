//! Repository trait for access history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, record::AccessEvent};

/// Append-only storage for successful login/logout history.
#[async_trait]
pub trait AccessLogRepository: Send + Sync + 'static {
    /// Append a login event.
    async fn record_login(&self, event: AccessEvent) -> Result<(), Error>;

    /// Stamp the most recent open login event for `username` with
    /// `logout_time`. Identity fields on the event are never modified.
    /// Returns the number of events patched (0 when no open event exists).
    async fn stamp_logout(
        &self,
        username: &str,
        logout_time: DateTime<Utc>,
    ) -> Result<u64, Error>;
}
