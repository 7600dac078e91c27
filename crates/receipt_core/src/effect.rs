use std::path::PathBuf;
use std::time::Duration;

use crate::{BatchId, FileKey, JobId, NewReceipt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Upload every file in order, reporting each one, then report the batch done.
    SubmitBatch {
        batch_id: BatchId,
        uploads: Vec<PendingUpload>,
    },
    /// (Re)start the poll timer. Replaces any running timer.
    StartPolling { interval: Duration },
    StopPolling,
    /// Query status once for each listed job.
    CheckJobs { checks: Vec<(FileKey, JobId)> },
    /// Best-effort server-side cancellation.
    CancelJob { job_id: JobId },
    /// Commit receipts one after another.
    SaveReceipts {
        batch_id: BatchId,
        items: Vec<(FileKey, NewReceipt)>,
    },
    FetchSavedReceipts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub key: FileKey,
    pub path: PathBuf,
    pub original_name: String,
}
