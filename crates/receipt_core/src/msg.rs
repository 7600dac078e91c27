use std::path::PathBuf;

use chrono::NaiveDate;

use crate::{BatchId, BatchSnapshot, ExtractedFields, FileKey, JobId, SavedReceipt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User picked files; they form a new batch.
    FilesSelected(Vec<PathBuf>),
    /// Engine finished one upload of the current submission.
    UploadFinished {
        key: FileKey,
        result: Result<JobId, String>,
    },
    /// Engine attempted every upload of a batch.
    SubmissionFinished { batch_id: BatchId },
    /// Poll timer fired.
    PollTick,
    /// Status answer for one job. `Err` is a transient check failure.
    JobChecked {
        key: FileKey,
        job_id: JobId,
        check: Result<JobCheck, String>,
    },
    /// User removed a file from the batch.
    FileRemoved { key: FileKey },
    /// User clicked Save All. `today` keys receipts without a readable date.
    SaveAllClicked { today: NaiveDate },
    /// Engine committed (or failed to commit) every receipt of a Save All.
    SaveFinished {
        batch_id: BatchId,
        outcomes: Vec<SaveOutcome>,
    },
    /// User asked for the list of saved receipts.
    SavedReceiptsRequested,
    SavedReceiptsLoaded(Result<Vec<SavedReceipt>, String>),
    /// Bring back an unsaved batch from a previous session.
    RestoreBatch(BatchSnapshot),
    /// Render tick.
    Tick,
    NoOp,
}

/// Server-reported job status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCheck {
    Pending,
    Processing,
    Completed {
        extracted: ExtractedFields,
        file_path: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub key: FileKey,
    pub result: Result<SavedReceipt, SaveFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveFailure {
    /// Backend already holds this receipt (HTTP 409).
    Duplicate(String),
    Rejected(String),
}
