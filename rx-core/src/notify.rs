//! Notification sink contract
//!
//! Triggered only when a validation result reaches Critical severity.
//! Like the audit sink, failures here are logged and never propagated.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::audit::SinkError;
use crate::validate::Severity;

/// An outbound notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub subject: String,
    pub body: String,
}

/// Destination for critical-severity notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), SinkError>;
}

/// Sink that retains notifications in memory for test inspection
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn send(&self, notification: Notification) -> Result<(), SinkError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

/// Sink that emits notifications as warning log lines
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn send(&self, notification: Notification) -> Result<(), SinkError> {
        tracing::warn!(
            severity = ?notification.severity,
            subject = %notification.subject,
            body = %notification.body,
            "clinical notification"
        );
        Ok(())
    }
}
