use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::receipt::{ExtractedFields, SavedReceipt};
use crate::view_model::AppViewModel;

/// Client-generated identifier of a selected file. Never reused within a process.
pub type FileKey = u64;
pub type BatchId = u64;
/// Opaque identifier the backend assigns to an extraction job.
pub type JobId = String;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Status checks allowed per job before it is failed as timed out.
    /// `None` polls until the backend reports a terminal state.
    pub max_attempts: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_POLL_ATTEMPTS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    #[default]
    Idle,
    Polling,
    Drained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub key: FileKey,
    pub path: PathBuf,
    pub original_name: String,
}

/// Terminal outcome of one file's upload and extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    Completed {
        extracted: ExtractedFields,
        file_path: String,
        job_id: JobId,
    },
    Failed {
        error: String,
        job_id: Option<JobId>,
    },
}

impl JobResult {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            JobResult::Completed { job_id, .. } => Some(job_id),
            JobResult::Failed { job_id, .. } => job_id.as_deref(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobResult::Completed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    AllSaved,
    Partial,
    AllFailed,
    NothingToSave,
}

/// Aggregate result of one Save All.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub status: SaveStatus,
    pub attempted: usize,
    pub saved: Vec<String>,
    pub duplicates: Vec<String>,
    pub errors: Vec<(String, String)>,
    pub skipped: usize,
}

impl SaveReport {
    pub fn failures(&self) -> usize {
        self.duplicates.len() + self.errors.len()
    }
}

/// Unsaved batch contents, written to disk between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub path: PathBuf,
    pub original_name: String,
    pub job_id: Option<JobId>,
    pub result: Option<JobResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileEntry {
    pub(crate) file: SelectedFile,
    pub(crate) job_id: Option<JobId>,
    pub(crate) result: Option<JobResult>,
    pub(crate) saved: bool,
    pub(crate) attempts: u32,
    pub(crate) check_in_flight: bool,
}

impl FileEntry {
    fn new(key: FileKey, path: PathBuf) -> Self {
        let original_name = display_name(&path);
        Self {
            file: SelectedFile {
                key,
                path,
                original_name,
            },
            job_id: None,
            result: None,
            saved: false,
            attempts: 0,
            check_in_flight: false,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.job_id.is_some() && self.result.is_none()
    }

    /// Job that still holds server-side resources worth cancelling.
    pub(crate) fn cancellable_job(&self) -> Option<&JobId> {
        if self.saved {
            None
        } else {
            self.job_id.as_ref()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Batch {
    pub(crate) id: BatchId,
    pub(crate) entries: Vec<FileEntry>,
    pub(crate) submitting: bool,
}

impl Batch {
    pub(crate) fn entry_mut(&mut self, key: FileKey) -> Option<&mut FileEntry> {
        self.entries.iter_mut().find(|entry| entry.file.key == key)
    }

    pub(crate) fn has_open_jobs(&self) -> bool {
        self.entries.iter().any(FileEntry::is_open)
    }

    pub(crate) fn all_resolved(&self) -> bool {
        self.entries.iter().all(|entry| entry.result.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SaveInFlight {
    pub(crate) batch_id: BatchId,
    pub(crate) skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub(crate) settings: PollSettings,
    next_key: FileKey,
    next_batch: BatchId,
    pub(crate) batch: Option<Batch>,
    pub(crate) poller: PollerState,
    pub(crate) saving: Option<SaveInFlight>,
    pub(crate) saved: Vec<SavedReceipt>,
    pub(crate) saved_loaded: bool,
    pub(crate) last_save: Option<SaveReport>,
    pub(crate) notice: Option<String>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_settings(settings: PollSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.settings
    }

    pub fn poller(&self) -> PollerState {
        self.poller
    }

    pub fn files(&self) -> Vec<&SelectedFile> {
        self.entries().iter().map(|entry| &entry.file).collect()
    }

    /// Result slots in file order; `None` while a file is still in flight.
    pub fn results(&self) -> Vec<Option<&JobResult>> {
        self.entries()
            .iter()
            .map(|entry| entry.result.as_ref())
            .collect()
    }

    /// Jobs that have been created and not yet reached a terminal state.
    pub fn open_jobs(&self) -> Vec<(FileKey, JobId)> {
        self.entries()
            .iter()
            .filter(|entry| entry.result.is_none())
            .filter_map(|entry| {
                let job_id = entry.job_id.clone()?;
                Some((entry.file.key, job_id))
            })
            .collect()
    }

    pub fn key_at(&self, position: usize) -> Option<FileKey> {
        self.entries().get(position).map(|entry| entry.file.key)
    }

    pub fn all_resolved(&self) -> bool {
        self.batch
            .as_ref()
            .is_some_and(|batch| !batch.entries.is_empty() && batch.all_resolved())
    }

    /// Save All is offered once every slot holds a terminal result.
    pub fn can_save(&self) -> bool {
        self.saving.is_none()
            && self.batch.as_ref().is_some_and(|batch| !batch.submitting)
            && self.all_resolved()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_some()
    }

    pub fn saved_receipts(&self) -> &[SavedReceipt] {
        &self.saved
    }

    pub fn last_save(&self) -> Option<&SaveReport> {
        self.last_save.as_ref()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel::build(self, self.dirty)
    }

    /// Returns and clears the render flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Everything not yet saved, for restoring in a later session.
    pub fn batch_snapshot(&self) -> Option<BatchSnapshot> {
        let entries: Vec<SnapshotEntry> = self
            .entries()
            .iter()
            .filter(|entry| !entry.saved)
            .map(|entry| SnapshotEntry {
                path: entry.file.path.clone(),
                original_name: entry.file.original_name.clone(),
                job_id: entry.job_id.clone(),
                result: entry.result.clone(),
            })
            .collect();
        (!entries.is_empty()).then_some(BatchSnapshot { entries })
    }

    pub(crate) fn entries(&self) -> &[FileEntry] {
        self.batch
            .as_ref()
            .map(|batch| batch.entries.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn batch_id(&self) -> Option<BatchId> {
        self.batch.as_ref().map(|batch| batch.id)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
        self.dirty = true;
    }

    /// Replaces the current batch with fresh entries for `paths`.
    pub(crate) fn start_batch(&mut self, paths: Vec<PathBuf>) -> BatchId {
        self.next_batch += 1;
        let id = self.next_batch;
        let entries = paths
            .into_iter()
            .map(|path| {
                let key = self.allocate_key();
                FileEntry::new(key, path)
            })
            .collect();
        self.batch = Some(Batch {
            id,
            entries,
            submitting: true,
        });
        self.poller = PollerState::Idle;
        self.dirty = true;
        id
    }

    pub(crate) fn restore_batch(&mut self, snapshot: BatchSnapshot) -> BatchId {
        self.next_batch += 1;
        let id = self.next_batch;
        let entries = snapshot
            .entries
            .into_iter()
            .map(|saved| {
                let key = self.allocate_key();
                let mut entry = FileEntry::new(key, saved.path);
                entry.file.original_name = saved.original_name;
                entry.result = match (&saved.job_id, saved.result) {
                    (_, Some(result)) => Some(result),
                    (Some(_), None) => None,
                    (None, None) => Some(JobResult::Failed {
                        error: "upload interrupted".to_string(),
                        job_id: None,
                    }),
                };
                entry.job_id = saved.job_id;
                entry
            })
            .collect();
        self.batch = Some(Batch {
            id,
            entries,
            submitting: false,
        });
        self.dirty = true;
        id
    }

    fn allocate_key(&mut self) -> FileKey {
        self.next_key += 1;
        self.next_key
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
