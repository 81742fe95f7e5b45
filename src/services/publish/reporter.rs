//! Upload status reporting
//!
//! The fan-out emits one upload entry per destination and settles it exactly
//! once. Events flow over an mpsc channel so the caller can collect them
//! after the fan-out completes without the publishers holding any shared
//! mutable state.

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }
}

/// One destination's upload, as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct Upload {
    pub id: Uuid,
    pub platform: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug)]
pub enum UploadEvent {
    Started { id: Uuid, platform: String },
    Settled {
        id: Uuid,
        status: UploadStatus,
        message: Option<String>,
    },
}

/// Sender half handed to the fan-out
#[derive(Clone)]
pub struct UploadReporter {
    tx: mpsc::UnboundedSender<UploadEvent>,
}

impl UploadReporter {
    /// Register a new upload for a destination, already in progress
    pub fn start(&self, platform: &str) -> Uuid {
        let id = Uuid::new_v4();
        let _ = self.tx.send(UploadEvent::Started {
            id,
            platform: platform.to_string(),
        });
        id
    }

    pub fn settle(&self, id: Uuid, success: bool, message: Option<String>) {
        let status = if success {
            UploadStatus::Completed
        } else {
            UploadStatus::Failed
        };
        let _ = self.tx.send(UploadEvent::Settled { id, status, message });
    }
}

/// Receiver half: folds events into the visible upload list
pub struct UploadLog {
    rx: mpsc::UnboundedReceiver<UploadEvent>,
    uploads: Vec<Upload>,
}

pub fn channel() -> (UploadReporter, UploadLog) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        UploadReporter { tx },
        UploadLog {
            rx,
            uploads: Vec::new(),
        },
    )
}

impl UploadLog {
    /// Apply all events received so far
    pub fn drain(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                UploadEvent::Started { id, platform } => {
                    self.uploads.push(Upload {
                        id,
                        platform,
                        status: UploadStatus::Uploading,
                        message: None,
                    });
                }
                UploadEvent::Settled { id, status, message } => {
                    if let Some(upload) = self.uploads.iter_mut().find(|u| u.id == id) {
                        // Terminal states are never revisited
                        if !upload.status.is_terminal() {
                            upload.status = status;
                            upload.message = message;
                        }
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> &[Upload] {
        &self.uploads
    }

    /// Drop settled entries, keeping anything still in flight
    pub fn clear_settled(&mut self) {
        self.uploads.retain(|u| !u.status.is_terminal());
    }

    pub fn into_uploads(mut self) -> Vec<Upload> {
        self.drain();
        self.uploads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_settle_reaches_terminal_state() {
        let (reporter, mut log) = channel();
        let id = reporter.start("youtube");
        reporter.settle(id, true, None);

        log.drain();
        let uploads = log.snapshot();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].platform, "youtube");
        assert_eq!(uploads[0].status, UploadStatus::Completed);
    }

    #[test]
    fn settled_uploads_are_not_revisited() {
        let (reporter, mut log) = channel();
        let id = reporter.start("youtube");
        reporter.settle(id, false, Some("quota exceeded".to_string()));
        reporter.settle(id, true, None);

        log.drain();
        let uploads = log.snapshot();
        assert_eq!(uploads[0].status, UploadStatus::Failed);
        assert_eq!(uploads[0].message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn clear_settled_keeps_in_flight_entries() {
        let (reporter, mut log) = channel();
        let done = reporter.start("youtube");
        reporter.settle(done, true, None);
        let _pending = reporter.start("tiktok");

        log.drain();
        log.clear_settled();
        let uploads = log.snapshot();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].platform, "tiktok");
        assert_eq!(uploads[0].status, UploadStatus::Uploading);
    }

    #[test]
    fn events_fold_in_order() {
        let (reporter, mut log) = channel();
        let a = reporter.start("youtube");
        let b = reporter.start("youtube");
        reporter.settle(b, false, Some("failed".to_string()));
        reporter.settle(a, true, None);

        log.drain();
        let uploads = log.snapshot();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].status, UploadStatus::Completed);
        assert_eq!(uploads[1].status, UploadStatus::Failed);
    }
}
