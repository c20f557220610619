//! Per-item progress events

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use tokio::sync::mpsc;

/// Pipeline phase for a single game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPhase {
    Pending,
    Requesting,
    Installing,
    Done { files: usize },
    Failed { reason: String },
}

/// Progress update for one item of a batch
#[derive(Debug, Clone)]
pub struct ItemProgress {
    /// 1-based position in the batch
    pub index: usize,
    pub total: usize,
    pub identifier: String,
    pub phase: ItemPhase,
}

/// Best-effort sender: a closed or full channel never stalls the batch
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ItemProgress>>,
    disabled: Arc<AtomicBool>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ItemProgress>) -> Self {
        Self {
            tx: Some(tx),
            disabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sink that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, progress: ItemProgress) {
        let Some(tx) = &self.tx else {
            return;
        };
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = tx.try_send(progress)
            && matches!(e, mpsc::error::TrySendError::Closed(_))
        {
            warn!("Progress channel closed, continuing without updates");
            self.disabled.store(true, Ordering::Relaxed);
        }
    }
}
