//! Action Controllers
//!
//! A controller sequences the gateway calls behind one user intent
//! (load a page, apply a filter, complete a task) and dispatches the
//! resulting actions into a view store. Confirmation and notification
//! side effects live here, behind injected traits, so the CLI can
//! prompt on stdin while tests answer programmatically.

mod auth;
mod tasks;

pub use auth::{AuthController, AuthError};
pub use tasks::{TaskApi, TaskController, TaskService, PAGE_SIZE};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A non-blocking user-facing notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Sink for user-facing notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that writes notices to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => tracing::info!("{}", notice.message),
            NoticeLevel::Error => tracing::error!("{}", notice.message),
        }
    }
}

/// Notifier that forwards notices over a channel
///
/// The receiver side is drained by whoever renders them (the CLI, or a
/// test asserting on emitted notices).
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // A dropped receiver just means nobody is rendering notices
        let _ = self.tx.send(notice);
    }
}

/// Gate for destructive operations
///
/// Controllers ask before a delete or complete goes out; a declined
/// confirmation means no request is made at all.
#[async_trait]
pub trait ConfirmPolicy: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Policy with a fixed answer
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmPolicy for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}
