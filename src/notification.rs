//! Notification events handed to the presentation layer.
//!
//! The engine never renders or plays anything itself. It produces
//! [`NotificationEvent`]s and passes them to a [`Notifier`].

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Sound a presenter should play alongside an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Pop,
    WoodPlankFlick,
    BeepShort,
}

impl Severity {
    pub fn sound_cue(&self) -> SoundCue {
        match self {
            Severity::Error => SoundCue::BeepShort,
            Severity::Warning => SoundCue::WoodPlankFlick,
            Severity::Info | Severity::Success => SoundCue::Pop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl NotificationEvent {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, message)
    }
}

/// Presentation collaborator that receives fired alerts.
pub trait Notifier {
    fn notify(&mut self, event: NotificationEvent);
}

/// Writes every alert to the tracing log. The default when a host has no UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, event: NotificationEvent) {
        let cue = event.severity.sound_cue();
        match event.severity {
            Severity::Info | Severity::Success => info!(title = %event.title, ?cue, "{}", event.message),
            Severity::Warning => warn!(title = %event.title, ?cue, "{}", event.message),
            Severity::Error => error!(title = %event.title, ?cue, "{}", event.message),
        }
    }
}

impl Notifier for Vec<NotificationEvent> {
    fn notify(&mut self, event: NotificationEvent) {
        self.push(event);
    }
}

impl Notifier for mpsc::UnboundedSender<NotificationEvent> {
    fn notify(&mut self, event: NotificationEvent) {
        if self.send(event).is_err() {
            warn!("Notification receiver dropped, alert discarded");
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, event: NotificationEvent) {
        (**self).notify(event)
    }
}
