//! Transient user feedback.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Notification {
        Notification { level: Level::Success, message: message.into() }
    }

    /// Builds an error notification, falling back to `fallback` for an empty message.
    pub fn error(message: impl Into<String>, fallback: &str) -> Notification {
        let message = message.into();
        let message = if message.trim().is_empty() { fallback.to_string() } else { message };
        Notification { level: Level::Error, message }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Prints successes to stdout and errors to stderr.
pub struct ConsoleNotifier {
    pub silent: bool,
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        if self.silent {
            return;
        }
        match n.level {
            Level::Success => println!("{}", n.message),
            Level::Error => eprintln!("{}", n.message),
        }
    }
}

/// Keeps every notification with the time it arrived.
#[derive(Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<(Instant, Notification)>>,
}

impl NotificationLog {
    pub fn new() -> NotificationLog {
        NotificationLog::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, n)| n.level == Level::Error)
            .map(|(_, n)| n.message.clone())
            .collect()
    }

    /// Notifications younger than `max_age`; older ones are dropped.
    pub fn recent(&self, max_age: Duration) -> Vec<Notification> {
        let mut entries = self.entries.lock();
        entries.retain(|(at, _)| at.elapsed() < max_age);
        entries.iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, n: Notification) {
        self.entries.lock().push((Instant::now(), n));
    }
}
