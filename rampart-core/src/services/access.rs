//! Session outcome recorder.
//!
//! Handles the success and logout paths: appends access history and,
//! when configured, clears accumulated failures after a successful login.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error,
    config::LockoutConfig,
    error::IdentityError,
    events::{Event, EventBus},
    identity::AttemptContext,
    record::AccessEvent,
    repositories::{AccessLogRepository, AttemptRepository},
};

/// Records successful logins and logouts.
///
/// The authentication layer calls [`record_success`](Self::record_success)
/// exactly once per successful login and
/// [`record_logout`](Self::record_logout) exactly once per logout.
pub struct AccessRecorder<R: AttemptRepository, L: AccessLogRepository> {
    attempts: Arc<R>,
    access_log: Arc<L>,
    events: EventBus,
    config: LockoutConfig,
}

impl<R: AttemptRepository, L: AccessLogRepository> AccessRecorder<R, L> {
    pub fn new(
        attempts: Arc<R>,
        access_log: Arc<L>,
        events: EventBus,
        config: LockoutConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            attempts,
            access_log,
            events,
            config,
        })
    }

    /// Handle a successful login.
    ///
    /// Sweeps expired records (housekeeping, not a precondition), appends a
    /// trusted login event unless access logging is disabled, and — when
    /// `reset_on_success` is set — clears the identity's failure record.
    /// Returns the number of cleared failures.
    pub async fn record_success(&self, ctx: &AttemptContext) -> Result<u64, Error> {
        let as_of = Utc::now();
        self.attempts
            .sweep_expired(self.config.active_since(as_of))
            .await?;

        tracing::info!(client = %ctx, "Successful login");

        if !self.config.disable_access_log && !self.config.disable_success_access_log {
            self.access_log
                .record_login(AccessEvent::login(ctx, as_of))
                .await?;
        }

        if !self.config.reset_on_success {
            return Ok(0);
        }

        let identity = match self.config.identification_policy.resolve(ctx) {
            Ok(identity) => identity,
            Err(IdentityError::MissingContext) => return Ok(0),
        };

        let cleared = self.attempts.reset(&identity).await?;
        if cleared > 0 {
            tracing::info!(
                identity = %identity,
                cleared,
                "Cleared failed login attempts after successful login"
            );
            self.events
                .publish(&Event::AttemptsReset {
                    identity,
                    cleared,
                    timestamp: as_of,
                })
                .await;
        }
        Ok(cleared)
    }

    /// Handle a logout.
    ///
    /// Stamps the most recent open login event for the username with the
    /// logout time. Logout of an anonymous session is a history no-op, as is
    /// any logout when access logging is disabled.
    pub async fn record_logout(&self, ctx: &AttemptContext) -> Result<(), Error> {
        let as_of = Utc::now();
        self.attempts
            .sweep_expired(self.config.active_since(as_of))
            .await?;

        tracing::info!(client = %ctx, "Successful logout");

        if self.config.disable_access_log {
            return Ok(());
        }
        let Some(username) = ctx.username.as_deref() else {
            return Ok(());
        };

        self.access_log.stamp_logout(username, as_of).await?;
        Ok(())
    }
}
