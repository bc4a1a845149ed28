use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Snapshot of acquisition progress for UI display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchProgressState {
    pub is_loading: bool,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub has_attempted_fetch: bool,
    pub progress: u8,
    pub message: String,
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Outbound hook for toast-style notifications. Suppressed on silent fetches.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that drops everything, for headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notice: Notice) {}
}

/// Publishes `FetchProgressState` transitions over a watch channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: watch::Sender<FetchProgressState>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(FetchProgressState::default());
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchProgressState> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> FetchProgressState {
        self.sender.borrow().clone()
    }

    pub fn started(&self, message: impl Into<String>) {
        self.publish(FetchProgressState {
            is_loading: true,
            is_error: false,
            error_message: None,
            has_attempted_fetch: true,
            progress: 5,
            message: message.into(),
        });
    }

    pub fn advance(&self, progress: u8, message: impl Into<String>) {
        let message = message.into();
        self.sender.send_modify(|state| {
            state.is_loading = true;
            state.progress = progress.min(99).max(state.progress);
            state.message = message;
        });
    }

    pub fn succeeded(&self, message: impl Into<String>) {
        self.publish(FetchProgressState {
            is_loading: false,
            is_error: false,
            error_message: None,
            has_attempted_fetch: true,
            progress: 100,
            message: message.into(),
        });
    }

    pub fn failed(&self, error_message: impl Into<String>) {
        let error_message = error_message.into();
        self.publish(FetchProgressState {
            is_loading: false,
            is_error: true,
            error_message: Some(error_message.clone()),
            has_attempted_fetch: true,
            progress: 100,
            message: error_message,
        });
    }

    fn publish(&self, state: FetchProgressState) {
        self.sender.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_never_moves_backwards_while_loading() {
        let reporter = ProgressReporter::new();
        reporter.started("checking");
        reporter.advance(40, "scraping");
        reporter.advance(20, "late update");
        let state = reporter.current();
        assert!(state.is_loading);
        assert_eq!(state.progress, 40);
        assert_eq!(state.message, "late update");
    }

    #[test]
    fn failure_records_error_message() {
        let reporter = ProgressReporter::new();
        let mut receiver = reporter.subscribe();
        reporter.started("checking");
        reporter.failed("all sources exhausted");
        assert!(receiver.has_changed().expect("sender alive"));
        let state = receiver.borrow_and_update().clone();
        assert!(state.is_error);
        assert!(!state.is_loading);
        assert!(state.has_attempted_fetch);
        assert_eq!(state.error_message.as_deref(), Some("all sources exhausted"));
    }
}
