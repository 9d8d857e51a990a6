//! User-facing notices and forced navigation.
//!
//! Notices are queued in-process and drained by the next rendered page.
//! The navigator holds at most one pending redirect that the navigation
//! middleware performs on the next page request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::api::RefreshError;
use crate::paths;

const MAX_QUEUED_NOTICES: usize = 20;
const DEFAULT_NOTICE_DURATION: Duration = Duration::from_secs(5);
const SESSION_EXPIRED_DURATION: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

impl NoticeLevel {
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "notice-success",
            Self::Info => "notice-info",
            Self::Error => "notice-error",
        }
    }
}

/// A toast shown once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
    pub duration: Duration,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: None,
            duration: DEFAULT_NOTICE_DURATION,
        }
    }

    #[must_use]
    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title)
    }

    #[must_use]
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title)
    }

    #[must_use]
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// The notice shown after a forced logout.
    #[must_use]
    pub fn session_expired() -> Self {
        Self::error("Session expired")
            .with_description("Please login again to continue.")
            .with_duration(SESSION_EXPIRED_DURATION)
    }
}

/// Bounded queue of pending notices. The oldest is dropped when full.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    queue: Arc<Mutex<VecDeque<Notice>>>,
}

impl NoticeBoard {
    pub fn push(&self, notice: Notice) {
        let mut queue = self.queue.lock();
        if queue.len() >= MAX_QUEUED_NOTICES {
            queue.pop_front();
        }
        queue.push_back(notice);
    }

    /// Take every pending notice, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<Notice> {
        self.queue.lock().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// One-shot pending redirect.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    pending: Arc<Mutex<Option<String>>>,
}

impl Navigator {
    /// Schedule a redirect. A later call replaces an earlier one.
    pub fn redirect_to(&self, path: impl Into<String>) {
        *self.pending.lock() = Some(path.into());
    }

    /// Take the pending redirect, if any.
    #[must_use]
    pub fn take(&self) -> Option<String> {
        self.pending.lock().take()
    }

    #[must_use]
    pub fn pending(&self) -> Option<String> {
        self.pending.lock().clone()
    }
}

/// Reaction to an unrecoverable session, invoked after the store is cleared.
pub trait SessionExpiryHandler: Send + Sync {
    fn session_expired(&self, error: &RefreshError);
}

/// Shows the "Session expired" notice and sends the user to the login page.
#[derive(Debug, Clone)]
pub struct ForcedLogout {
    notices: NoticeBoard,
    navigator: Navigator,
}

impl ForcedLogout {
    #[must_use]
    pub const fn new(notices: NoticeBoard, navigator: Navigator) -> Self {
        Self { notices, navigator }
    }
}

impl SessionExpiryHandler for ForcedLogout {
    fn session_expired(&self, error: &RefreshError) {
        tracing::info!(reason = %error, "Session expired, redirecting to login");
        self.notices.push(Notice::session_expired());
        self.navigator.redirect_to(paths::LOGIN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_board_is_bounded_fifo() {
        let board = NoticeBoard::default();
        for i in 0..25 {
            board.push(Notice::info(format!("n{i}")));
        }
        assert_eq!(board.len(), MAX_QUEUED_NOTICES);

        let drained = board.drain();
        assert_eq!(drained.first().map(|n| n.title.as_str()), Some("n5"));
        assert_eq!(drained.last().map(|n| n.title.as_str()), Some("n24"));
        assert!(board.is_empty());
    }

    #[test]
    fn test_navigator_is_one_shot() {
        let navigator = Navigator::default();
        assert!(navigator.take().is_none());
        navigator.redirect_to("/a");
        navigator.redirect_to("/b");
        assert_eq!(navigator.take().as_deref(), Some("/b"));
        assert!(navigator.take().is_none());
    }

    #[test]
    fn test_forced_logout_notice_and_redirect() {
        let notices = NoticeBoard::default();
        let navigator = Navigator::default();
        ForcedLogout::new(notices.clone(), navigator.clone())
            .session_expired(&RefreshError::MissingRefreshToken);

        let drained = notices.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].title, "Session expired");
        assert_eq!(
            drained[0].description.as_deref(),
            Some("Please login again to continue.")
        );
        assert_eq!(drained[0].duration, Duration::from_secs(10));
        assert_eq!(drained[0].level, NoticeLevel::Error);
        assert_eq!(navigator.pending().as_deref(), Some(paths::LOGIN));
    }
}
