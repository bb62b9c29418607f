//! Stakeholder notifications. The scheduler decides who is told what; how
//! the message travels is up to the [`NotificationSink`] implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SessionProgrammed,
    SessionPublished,
    QuotaAlert,
    AutomationCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub session_id: Option<i64>,
    pub subject_id: Option<i64>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            session_id: None,
            subject_id: None,
        }
    }

    pub fn for_session(mut self, session_id: i64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn for_subject(mut self, subject_id: i64) -> Self {
        self.subject_id = Some(subject_id);
        self
    }
}

/// Fire-and-forget delivery. Implementations must not fail the caller; a
/// lost notification is never a reason to roll back scheduling work.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, recipients: &[i64], notification: &Notification);
}

/// Writes notifications to the log.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, recipients: &[i64], notification: &Notification) {
        info!(
            kind = ?notification.kind,
            recipients = ?recipients,
            "{}: {}",
            notification.title,
            notification.message
        );
    }
}

pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn notify(&self, _recipients: &[i64], _notification: &Notification) {}
}

/// Keeps every delivered notification in memory.
#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<(Vec<i64>, Notification)>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Vec<i64>, Notification)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent().iter().filter(|(_, n)| n.kind == kind).count()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, recipients: &[i64], notification: &Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipients.to_vec(), notification.clone()));
        }
    }
}

/// Drops duplicate and missing recipients while keeping the first-seen order.
pub fn recipients<I>(ids: I) -> Vec<i64>
where
    I: IntoIterator<Item = Option<i64>>,
{
    let mut out: Vec<i64> = Vec::new();
    for id in ids.into_iter().flatten() {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
