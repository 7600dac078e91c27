use std::fmt;
use std::path::PathBuf;

use receipt_core::{BatchId, ExtractedFields, FileKey, JobId, NewReceipt, SavedReceipt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Body of `GET /api/receipts/jobs/:jobId`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<JobPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    #[serde(default)]
    pub extracted: ExtractedFields,
    #[serde(default, alias = "file_path")]
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub key: FileKey,
    pub path: PathBuf,
    pub original_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub key: FileKey,
    pub receipt: NewReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    UploadFinished {
        key: FileKey,
        result: Result<JobId, ApiError>,
    },
    SubmissionFinished {
        batch_id: BatchId,
    },
    PollTick,
    JobChecked {
        key: FileKey,
        job_id: JobId,
        result: Result<JobStatusReport, ApiError>,
    },
    SaveFinished {
        batch_id: BatchId,
        outcomes: Vec<(FileKey, Result<SavedReceipt, ApiError>)>,
    },
    ReceiptsListed(Result<Vec<SavedReceipt>, ApiError>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    /// The backend already holds this receipt (HTTP 409).
    Duplicate,
    Timeout,
    Network,
    Decode,
    FileRead,
    UnsupportedFile { mime: String },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Duplicate => write!(f, "duplicate receipt"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::FileRead => write!(f, "file unreadable"),
            FailureKind::UnsupportedFile { mime } => write!(f, "unsupported file type {mime}"),
        }
    }
}
