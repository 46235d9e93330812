//! User-facing notifications.
//!
//! The controller reports to the user through an injected [`Notifier`] rather
//! than a global alert singleton. A UI shell either implements the trait
//! directly or drives a [`ChannelNotifier`]: it receives [`Prompt`]s, shows
//! them, and resolves confirms through the attached [`ConfirmResponder`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long an alert stays on screen unless overridden
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_millis(2000);

/// Boxed future returned by [`Notifier::confirm`]
pub type NotifyFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Visual style of an alert
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Positive confirmation
    #[default]
    Success,
    /// Something failed
    Error,
    /// Something needs attention
    Warning,
    /// Neutral information
    Info,
}

/// A transient alert
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Text shown to the user
    pub message: String,
    /// Visual style
    pub kind: NoticeKind,
    /// How long the alert stays visible
    pub duration: Duration,
}

impl Notice {
    /// Create an alert with the default duration
    #[must_use]
    pub fn new(message: impl Into<String>, kind: NoticeKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration: DEFAULT_NOTICE_DURATION,
        }
    }

    /// Success alert
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NoticeKind::Success)
    }

    /// Error alert
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NoticeKind::Error)
    }

    /// Warning alert
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NoticeKind::Warning)
    }

    /// Informational alert
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, NoticeKind::Info)
    }

    /// Override how long the alert stays visible
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Visual style of a confirm dialog
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConfirmVariant {
    /// Regular confirmation
    #[default]
    Success,
    /// Confirmation of an action that discards something
    Destructive,
}

/// A yes/no question for the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmPrompt {
    /// Question shown to the user
    pub message: String,
    /// Visual style
    pub variant: ConfirmVariant,
    /// Label of the confirm button
    pub confirm_text: String,
    /// Label of the cancel button
    pub cancel_text: String,
}

impl ConfirmPrompt {
    /// Regular confirm dialog with `OK` / `Cancel` buttons
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variant: ConfirmVariant::Success,
            confirm_text: "OK".to_string(),
            cancel_text: "Cancel".to_string(),
        }
    }

    /// Destructive confirm dialog
    #[must_use]
    pub fn destructive(message: impl Into<String>) -> Self {
        Self {
            variant: ConfirmVariant::Destructive,
            ..Self::new(message)
        }
    }

    /// Set the confirm button label
    #[must_use]
    pub fn with_confirm_text(mut self, text: impl Into<String>) -> Self {
        self.confirm_text = text.into();
        self
    }

    /// Set the cancel button label
    #[must_use]
    pub fn with_cancel_text(mut self, text: impl Into<String>) -> Self {
        self.cancel_text = text.into();
        self
    }
}

/// Shows alerts and asks the user to confirm
pub trait Notifier: Send + Sync {
    /// Show an alert; never blocks
    fn alert(&self, notice: Notice);

    /// Ask the user; resolves to `true` if they confirmed
    fn confirm(&self, prompt: ConfirmPrompt) -> NotifyFuture<'_, bool>;
}

/// Resolves one pending confirm dialog
#[derive(Debug)]
pub struct ConfirmResponder(oneshot::Sender<bool>);

impl ConfirmResponder {
    /// The user pressed the confirm button
    pub fn confirm(self) {
        self.resolve(true);
    }

    /// The user pressed cancel or dismissed the dialog
    pub fn cancel(self) {
        self.resolve(false);
    }

    /// Resolve with an explicit answer
    pub fn resolve(self, confirmed: bool) {
        let _ = self.0.send(confirmed);
    }
}

/// Something the UI should show
#[derive(Debug)]
pub enum Prompt {
    /// Transient alert
    Alert(Notice),
    /// Confirm dialog waiting for an answer
    Confirm {
        /// What to ask
        prompt: ConfirmPrompt,
        /// Where the answer goes; dropping it counts as cancel
        responder: ConfirmResponder,
    },
}

/// [`Notifier`] that forwards prompts to a UI task over a channel
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Prompt>,
}

impl ChannelNotifier {
    /// Create the notifier and the receiver the UI task drains
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Prompt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn alert(&self, notice: Notice) {
        if self.tx.send(Prompt::Alert(notice)).is_err() {
            tracing::debug!("Notice dropped: no UI listening");
        }
    }

    fn confirm(&self, prompt: ConfirmPrompt) -> NotifyFuture<'_, bool> {
        let (responder, answer) = oneshot::channel();
        let sent = self
            .tx
            .send(Prompt::Confirm {
                prompt,
                responder: ConfirmResponder(responder),
            })
            .is_ok();

        Box::pin(async move {
            if !sent {
                tracing::debug!("Confirm dropped: no UI listening");
                return false;
            }
            answer.await.unwrap_or(false)
        })
    }
}

/// Headless [`Notifier`] that logs alerts and declines every confirm
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn alert(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Error => tracing::error!(message = %notice.message, "Alert"),
            NoticeKind::Warning => tracing::warn!(message = %notice.message, "Alert"),
            NoticeKind::Success | NoticeKind::Info => {
                tracing::info!(message = %notice.message, "Alert");
            },
        }
    }

    fn confirm(&self, prompt: ConfirmPrompt) -> NotifyFuture<'_, bool> {
        tracing::info!(message = %prompt.message, "Confirm declined: no interactive UI");
        Box::pin(async { false })
    }
}
