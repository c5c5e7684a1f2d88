use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 0 to 100.
    pub percent: u8,
    pub label: String,
}

/// Where an operation reports `(percent, label)` updates.
///
/// A sink without a receiver swallows events, and a dropped receiver is not an
/// error: progress is advisory and never fails a download.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    sender: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, percent: u8, label: impl Into<String>) {
        let event = ProgressEvent {
            percent: percent.min(100),
            label: label.into(),
        };
        log::trace!("Progress {}%: {}", event.percent, event.label);
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
