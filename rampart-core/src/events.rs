//! Event bus for lockout notifications.
//!
//! Subscribers are notified when an identity is locked out or its failures
//! are cleared. Publishing is fire-and-forget: a failing handler is logged
//! and never blocks or fails the authentication path. The lockout decision
//! itself is returned synchronously by the engine, not through the bus.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::EventError;
use crate::identity::ClientIdentity;
use crate::record::ContextEntry;

/// Events emitted around lockout decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// An identity crossed the failure limit and is locked out. The caller
    /// has already been signaled to deny the attempt when this fires.
    LockedOut {
        identity: ClientIdentity,
        failure_count: u32,
        context: ContextEntry,
        timestamp: DateTime<Utc>,
    },
    /// A successful login cleared accumulated failures for an identity.
    AttemptsReset {
        identity: ClientIdentity,
        cleared: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Handler registered with the [`EventBus`].
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Fans events out to registered handlers.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Publish an event to all handlers. At-least-once, fire-and-forget:
    /// handler errors are logged and remaining handlers still run.
    pub async fn publish(&self, event: &Event) {
        for handler in self.handlers.read().await.iter() {
            if let Err(e) = handler.handle_event(event).await {
                tracing::warn!(error = %e, "Event handler failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringHandler;

    #[async_trait]
    impl EventHandler for ErroringHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::Handler("subscriber down".to_string()))
        }
    }

    fn lockout_event() -> Event {
        Event::LockedOut {
            identity: ClientIdentity {
                username: Some("mallory".to_string()),
                ip_address: None,
                user_agent: None,
            },
            failure_count: 3,
            context: ContextEntry {
                occurred_at: Utc::now(),
                path: None,
                user_agent: None,
                ip_address: None,
                extra: None,
            },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_with_no_handlers() {
        let bus = EventBus::default();
        bus.publish(&lockout_event()).await;
    }

    #[tokio::test]
    async fn test_all_handlers_called() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.register(Arc::new(CountingHandler {
            calls: calls.clone(),
        }))
        .await;
        bus.register(Arc::new(CountingHandler {
            calls: calls.clone(),
        }))
        .await;

        bus.publish(&lockout_event()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_others() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.register(Arc::new(ErroringHandler)).await;
        bus.register(Arc::new(CountingHandler {
            calls: calls.clone(),
        }))
        .await;

        // Fire-and-forget: the erroring handler must not break publishing.
        bus.publish(&lockout_event()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
