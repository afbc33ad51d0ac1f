use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A transient, user-visible message ("toast").
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

pub struct Notifier {
    ttl: Duration,
    notices: Vec<Notice>,
}

impl Notifier {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(4)),
            notices: Vec::new(),
        }
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message.into());
    }

    fn push(&mut self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Error => error!(notice = %message),
            NoticeLevel::Success => info!(notice = %message),
        }
        self.notices.push(Notice {
            level,
            message,
            created_at: Utc::now(),
        });
    }

    /// Drops notices that have been visible longer than the time-to-live.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.notices.retain(|n| now - n.created_at < ttl);
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.last()
    }

    pub fn all(&self) -> &[Notice] {
        &self.notices
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(4))
    }
}
