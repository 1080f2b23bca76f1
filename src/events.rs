//! User-facing notifications.
//!
//! Operations that a person triggers (upload, summarize, save, regenerate)
//! report a short success or failure notice through an [`EventSink`] they are
//! handed explicitly. The binary logs them; the HTTP server and tests collect
//! them.

use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Receives notifications. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to `tracing`.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Error => tracing::warn!(title = %n.title, "{}", n.description),
            Level::Info | Level::Success => tracing::info!(title = %n.title, "{}", n.description),
        }
    }
}

/// Keeps every notification in memory.
#[derive(Default)]
pub struct CollectingSink {
    items: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything collected so far.
    pub fn drain(&self) -> Vec<Notification> {
        match self.items.lock() {
            Ok(mut items) => std::mem::take(&mut *items),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for CollectingSink {
    fn notify(&self, notification: Notification) {
        match self.items.lock() {
            Ok(mut items) => items.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_drains_in_order() {
        let sink = CollectingSink::new();
        sink.notify(Notification::info("Processing document", "minutes.pdf"));
        sink.notify(Notification::error("Processing failed", "boom"));

        let got = sink.drain();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].level, Level::Info);
        assert_eq!(got[1].title, "Processing failed");
        assert!(sink.drain().is_empty());
    }
}
