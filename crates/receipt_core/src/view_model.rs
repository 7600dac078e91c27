use std::collections::BTreeMap;

use crate::{
    AppState, BatchId, ExtractedFields, FileKey, JobId, JobResult, PollerState, SaveReport,
    SavedReceipt,
};

/// Group label for receipts the backend stored without a month-year key.
const UNGROUPED: &str = "undated";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub batch_id: Option<BatchId>,
    pub poller: PollerState,
    pub submitting: bool,
    pub files: Vec<FileRowView>,
    pub open_jobs: usize,
    pub all_resolved: bool,
    pub can_save: bool,
    pub saving: bool,
    pub saved: Vec<SavedReceipt>,
    pub saved_loaded: bool,
    pub last_save: Option<SaveReport>,
    pub notice: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRowView {
    pub position: usize,
    pub key: FileKey,
    pub original_name: String,
    pub job_id: Option<JobId>,
    pub status: SlotStatus,
    pub saved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    Uploading,
    Processing,
    Completed(ExtractedFields),
    Failed(String),
}

impl AppViewModel {
    pub(crate) fn build(state: &AppState, dirty: bool) -> Self {
        let files: Vec<FileRowView> = state
            .entries()
            .iter()
            .enumerate()
            .map(|(position, entry)| FileRowView {
                position,
                key: entry.file.key,
                original_name: entry.file.original_name.clone(),
                job_id: entry.job_id.clone(),
                status: match (&entry.result, &entry.job_id) {
                    (Some(JobResult::Completed { extracted, .. }), _) => {
                        SlotStatus::Completed(extracted.clone())
                    }
                    (Some(JobResult::Failed { error, .. }), _) => SlotStatus::Failed(error.clone()),
                    (None, Some(_)) => SlotStatus::Processing,
                    (None, None) => SlotStatus::Uploading,
                },
                saved: entry.saved,
            })
            .collect();
        let open_jobs = files
            .iter()
            .filter(|row| row.status == SlotStatus::Processing)
            .count();

        Self {
            batch_id: state.batch_id(),
            poller: state.poller,
            submitting: state.batch.as_ref().is_some_and(|batch| batch.submitting),
            files,
            open_jobs,
            all_resolved: state.all_resolved(),
            can_save: state.can_save(),
            saving: state.saving.is_some(),
            saved: state.saved.clone(),
            saved_loaded: state.saved_loaded,
            last_save: state.last_save.clone(),
            notice: state.notice.clone(),
            dirty,
        }
    }
}

/// Saved receipts bucketed by month-year key, in ascending key order.
pub fn group_by_month(receipts: &[SavedReceipt]) -> BTreeMap<&str, Vec<&SavedReceipt>> {
    let mut groups: BTreeMap<&str, Vec<&SavedReceipt>> = BTreeMap::new();
    for receipt in receipts {
        let key = receipt
            .month_year
            .as_deref()
            .filter(|key| !key.is_empty())
            .unwrap_or(UNGROUPED);
        groups.entry(key).or_default().push(receipt);
    }
    groups
}
