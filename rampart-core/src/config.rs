//! Engine configuration.

use chrono::{DateTime, Duration, Utc};

use crate::error::ConfigError;
use crate::identity::IdentificationPolicy;

/// Configuration for attempt tracking and lockout, passed to the services at
/// construction. No global mutable settings.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Failures within one window before the client is locked out. Must be
    /// greater than zero.
    pub failure_limit: u32,
    /// How long a record stays active after its last failure. An inactive
    /// record is expired by the sweep and counting starts over.
    pub cooldown_period: Duration,
    /// How attempts are grouped into identities.
    pub identification_policy: IdentificationPolicy,
    /// Clear the identity's failure record on successful login.
    pub reset_on_success: bool,
    /// Disable all access history recording (logins and logouts).
    pub disable_access_log: bool,
    /// Disable access history for successful logins only.
    pub disable_success_access_log: bool,
    /// Emit a log line when a whitelisted client fails a login. Never
    /// creates a record either way.
    pub log_whitelisted: bool,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            failure_limit: 3,
            cooldown_period: Duration::minutes(30),
            identification_policy: IdentificationPolicy::default(),
            reset_on_success: false,
            disable_access_log: false,
            disable_success_access_log: false,
            log_whitelisted: false,
        }
    }
}

impl LockoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_limit == 0 {
            return Err(ConfigError::ZeroFailureLimit);
        }
        if self.cooldown_period <= Duration::zero() {
            return Err(ConfigError::NonPositiveCooldown);
        }
        Ok(())
    }

    /// Earliest `last_attempt_time` still considered active at `as_of`.
    pub fn active_since(&self, as_of: DateTime<Utc>) -> DateTime<Utc> {
        as_of - self.cooldown_period
    }
}
