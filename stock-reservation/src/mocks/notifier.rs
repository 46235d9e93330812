//! Mock notifier for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::notifier::{ConfirmPrompt, Notice, Notifier, NotifyFuture};

/// Notifier that records alerts and answers confirms with a preset value
#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
    prompts: Arc<Mutex<Vec<ConfirmPrompt>>>,
    answer: Arc<AtomicBool>,
}

impl RecordingNotifier {
    /// Notifier whose user confirms every prompt
    #[must_use]
    pub fn new() -> Self {
        Self {
            notices: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            answer: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Set the answer to future confirms
    pub fn answer_confirms(&self, confirmed: bool) {
        self.answer.store(confirmed, Ordering::SeqCst);
    }

    /// Alerts shown so far
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Confirm prompts shown so far
    #[must_use]
    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }

    fn confirm(&self, prompt: ConfirmPrompt) -> NotifyFuture<'_, bool> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt);
        let confirmed = self.answer.load(Ordering::SeqCst);
        Box::pin(async move { confirmed })
    }
}
