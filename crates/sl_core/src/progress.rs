use std::{fmt::Display, sync::mpsc::Sender};

/// Which step of a long-running job an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Runtime,
    Version,
    Libraries,
    Loader,
    Content,
    Config,
    Done,
    UpdateCheck,
    UpdateDownload,
    UpdateInstall,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Phase::Runtime => "Java",
                Phase::Version => "Version",
                Phase::Libraries => "Libraries",
                Phase::Loader => "Fabric",
                Phase::Content => "Content",
                Phase::Config => "Config",
                Phase::Done => "Done",
                Phase::UpdateCheck => "Update check",
                Phase::UpdateDownload => "Update download",
                Phase::UpdateInstall => "Update install",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One step of progress, published by both
/// the installer and the updater.
///
/// `percent` is only filled in where there's
/// something to measure (the update download).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub percent: Option<u8>,
    pub message: String,
    pub severity: Severity,
}

/// Sending half of the progress channel.
///
/// Cheap to clone. Sending never fails: if nobody
/// is listening (or there's no channel at all)
/// the event is dropped.
#[derive(Debug, Clone, Default)]
pub struct ProgressSender(Option<Sender<ProgressEvent>>);

impl ProgressSender {
    #[must_use]
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self(Some(sender))
    }

    /// A sender that goes nowhere.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    pub fn send(&self, event: ProgressEvent) {
        if let Some(sender) = &self.0 {
            _ = sender.send(event);
        }
    }

    pub fn log(&self, phase: Phase, severity: Severity, message: impl Into<String>) {
        self.send(ProgressEvent {
            phase,
            percent: None,
            message: message.into(),
            severity,
        });
    }

    pub fn info(&self, phase: Phase, message: impl Into<String>) {
        self.log(phase, Severity::Info, message);
    }

    pub fn success(&self, phase: Phase, message: impl Into<String>) {
        self.log(phase, Severity::Success, message);
    }

    pub fn warning(&self, phase: Phase, message: impl Into<String>) {
        self.log(phase, Severity::Warning, message);
    }

    pub fn error(&self, phase: Phase, message: impl Into<String>) {
        self.log(phase, Severity::Error, message);
    }

    pub fn percent(&self, phase: Phase, percent: u8, message: impl Into<String>) {
        self.send(ProgressEvent {
            phase,
            percent: Some(percent.min(100)),
            message: message.into(),
            severity: Severity::Info,
        });
    }
}

impl From<Sender<ProgressEvent>> for ProgressSender {
    fn from(value: Sender<ProgressEvent>) -> Self {
        Self::new(value)
    }
}

impl From<Option<Sender<ProgressEvent>>> for ProgressSender {
    fn from(value: Option<Sender<ProgressEvent>>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (tx, rx) = std::sync::mpsc::channel();
        let progress = ProgressSender::new(tx);
        progress.info(Phase::Runtime, "probing");
        progress.percent(Phase::UpdateDownload, 140, "almost");

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Info);
        assert_eq!(events[0].percent, None);
        assert_eq!(events[1].percent, Some(100));
    }

    #[test]
    fn dropped_receiver_is_fine() {
        let (tx, rx) = std::sync::mpsc::channel();
        drop(rx);
        ProgressSender::new(tx).error(Phase::Content, "nobody hears this");
        ProgressSender::none().success(Phase::Done, "nor this");
    }
}
