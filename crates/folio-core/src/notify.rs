//! User-facing notifications
//!
//! Operations return plain results; whoever drives them reports outcomes to
//! a `Notifier`, which fans out to every registered sink (a toast area, a
//! terminal, the log).

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Receives notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: &Notification) {
        match notification.severity {
            Severity::Error => warn!(message = %notification.message, "notification"),
            _ => info!(message = %notification.message, "notification"),
        }
    }
}

/// Keeps every notification it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notifications().into_iter().map(|n| n.message).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
    }
}

/// Fan-out to registered sinks
#[derive(Clone, Default)]
pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        let notification = Notification {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        };
        for sink in &self.sinks {
            sink.notify(&notification);
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(Severity::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }

    /// Report `outcome`: `on_success` on `Ok`, the error's message prefixed
    /// with `context` on `Err`
    pub fn report<T>(
        &self,
        outcome: &Result<T, Error>,
        on_success: impl FnOnce(&T) -> String,
        context: &str,
    ) {
        match outcome {
            Ok(value) => self.success(on_success(value)),
            Err(Error::UserCancelled) => {}
            Err(e) => self.error(format!("{}: {}", context, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fans_out_to_every_sink() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let notifier = Notifier::new()
            .with_sink(a.clone())
            .with_sink(b.clone())
            .with_sink(Arc::new(TracingSink));

        notifier.success("Saved");
        assert_eq!(a.messages(), vec!["Saved"]);
        assert_eq!(b.notifications()[0].severity, Severity::Success);
    }

    #[test]
    fn test_report_formats_outcomes() {
        let sink = Arc::new(RecordingSink::new());
        let notifier = Notifier::new().with_sink(sink.clone());

        notifier.report(&Ok::<_, Error>(3), |n| format!("{} rows", n), "Load failed");
        notifier.report(
            &Err::<(), _>(Error::MissingField("name".to_string())),
            |_| String::new(),
            "Save failed",
        );
        notifier.report(&Err::<(), _>(Error::UserCancelled), |_| String::new(), "x");

        let notifications = sink.notifications();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].message, "3 rows");
        assert_eq!(notifications[1].severity, Severity::Error);
        assert_eq!(
            notifications[1].message,
            "Save failed: Field 'name' is required"
        );
    }
}
