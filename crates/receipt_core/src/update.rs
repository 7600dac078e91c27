use std::path::PathBuf;

use chrono::NaiveDate;

use crate::state::{FileEntry, SaveInFlight};
use crate::{
    month_year_key, AppState, BatchId, BatchSnapshot, Effect, FileKey, JobCheck, JobId,
    JobResult, Msg, NewReceipt, PendingUpload, PollerState, SaveFailure, SaveOutcome,
    SaveReport, SaveStatus,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FilesSelected(paths) => select_files(&mut state, paths),
        Msg::UploadFinished { key, result } => apply_upload(&mut state, key, result),
        Msg::SubmissionFinished { batch_id } => finish_submission(&mut state, batch_id),
        Msg::PollTick => poll_tick(&mut state),
        Msg::JobChecked { key, job_id, check } => apply_check(&mut state, key, job_id, check),
        Msg::FileRemoved { key } => remove_file(&mut state, key),
        Msg::SaveAllClicked { today } => begin_save(&mut state, today),
        Msg::SaveFinished { batch_id, outcomes } => finish_save(&mut state, batch_id, outcomes),
        Msg::SavedReceiptsRequested => {
            state.set_notice("Loading saved receipts");
            vec![Effect::FetchSavedReceipts]
        }
        Msg::SavedReceiptsLoaded(Ok(receipts)) => {
            state.saved = receipts;
            state.saved_loaded = true;
            state.notice = None;
            state.mark_dirty();
            Vec::new()
        }
        Msg::SavedReceiptsLoaded(Err(err)) => {
            state.set_notice(format!("Could not load saved receipts: {err}"));
            Vec::new()
        }
        Msg::RestoreBatch(snapshot) => restore(&mut state, snapshot),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn select_files(state: &mut AppState, paths: Vec<PathBuf>) -> Vec<Effect> {
    if paths.is_empty() {
        return Vec::new();
    }
    if state.saving.is_some() {
        state.set_notice("Wait for the save to finish before starting a new batch");
        return Vec::new();
    }

    let mut effects = Vec::with_capacity(paths.len() + 2);
    if state.poller == PollerState::Polling {
        effects.push(Effect::StopPolling);
    }
    // A replaced batch releases its unsaved jobs just like removing every file would.
    for entry in state.entries() {
        if let Some(job_id) = entry.cancellable_job() {
            effects.push(Effect::CancelJob {
                job_id: job_id.clone(),
            });
        }
    }

    let batch_id = state.start_batch(paths);
    let uploads: Vec<PendingUpload> = state
        .entries()
        .iter()
        .map(|entry| PendingUpload {
            key: entry.file.key,
            path: entry.file.path.clone(),
            original_name: entry.file.original_name.clone(),
        })
        .collect();
    state.set_notice(format!("Uploading {} receipt(s)", uploads.len()));
    effects.push(Effect::SubmitBatch { batch_id, uploads });
    effects
}

fn apply_upload(state: &mut AppState, key: FileKey, result: Result<JobId, String>) -> Vec<Effect> {
    let Some(entry) = state.batch.as_mut().and_then(|batch| batch.entry_mut(key)) else {
        // The file was removed (or its batch replaced) while uploading.
        return match result {
            Ok(job_id) => vec![Effect::CancelJob { job_id }],
            Err(_) => Vec::new(),
        };
    };

    match result {
        Ok(job_id) => entry.job_id = Some(job_id),
        Err(error) => {
            entry.result = Some(JobResult::Failed {
                error,
                job_id: None,
            })
        }
    }
    state.mark_dirty();
    Vec::new()
}

fn finish_submission(state: &mut AppState, batch_id: BatchId) -> Vec<Effect> {
    let Some(batch) = state.batch.as_mut().filter(|batch| batch.id == batch_id) else {
        return Vec::new();
    };
    if !batch.submitting {
        return Vec::new();
    }
    batch.submitting = false;
    let has_open = batch.has_open_jobs();
    state.mark_dirty();

    if has_open {
        state.poller = PollerState::Polling;
        state.notice = Some("Processing receipts".to_string());
        vec![Effect::StartPolling {
            interval: state.settings.interval,
        }]
    } else {
        state.poller = PollerState::Drained;
        state.notice = None;
        Vec::new()
    }
}

fn poll_tick(state: &mut AppState) -> Vec<Effect> {
    if state.poller != PollerState::Polling {
        return Vec::new();
    }
    let Some(batch) = state.batch.as_mut() else {
        return drain(state);
    };
    if !batch.has_open_jobs() {
        return drain(state);
    }

    // Snapshot of the open set at cycle start; answers are matched back by key.
    let checks: Vec<(FileKey, JobId)> = batch
        .entries
        .iter_mut()
        .filter(|entry| entry.is_open() && !entry.check_in_flight)
        .filter_map(|entry| {
            let job_id = entry.job_id.clone()?;
            entry.check_in_flight = true;
            entry.attempts += 1;
            Some((entry.file.key, job_id))
        })
        .collect();

    if checks.is_empty() {
        Vec::new()
    } else {
        vec![Effect::CheckJobs { checks }]
    }
}

fn apply_check(
    state: &mut AppState,
    key: FileKey,
    job_id: JobId,
    check: Result<JobCheck, String>,
) -> Vec<Effect> {
    let max_attempts = state.settings.max_attempts;
    let Some(entry) = state.batch.as_mut().and_then(|batch| batch.entry_mut(key)) else {
        return Vec::new();
    };
    entry.check_in_flight = false;
    if !entry.is_open() || entry.job_id.as_deref() != Some(job_id.as_str()) {
        return Vec::new();
    }

    let resolved = match check {
        Ok(JobCheck::Completed {
            extracted,
            file_path,
        }) => Some(JobResult::Completed {
            extracted,
            file_path,
            job_id,
        }),
        Ok(JobCheck::Failed { error }) => Some(JobResult::Failed {
            error,
            job_id: Some(job_id),
        }),
        Ok(JobCheck::Pending | JobCheck::Processing) | Err(_) => {
            timed_out(entry, max_attempts).map(|attempts| JobResult::Failed {
                error: format!("timed out after {attempts} status checks"),
                job_id: Some(job_id),
            })
        }
    };

    let Some(result) = resolved else {
        return Vec::new();
    };
    entry.result = Some(result);
    state.mark_dirty();

    let has_open = state.batch.as_ref().is_some_and(|batch| batch.has_open_jobs());
    if state.poller == PollerState::Polling && !has_open {
        drain(state)
    } else {
        Vec::new()
    }
}

fn timed_out(entry: &FileEntry, max_attempts: Option<u32>) -> Option<u32> {
    max_attempts.filter(|max| entry.attempts >= *max)
}

fn remove_file(state: &mut AppState, key: FileKey) -> Vec<Effect> {
    if !state.entries().iter().any(|entry| entry.file.key == key) {
        return Vec::new();
    }
    // Saved records point at the uploaded file, so its job must outlive the save request.
    if state.saving.is_some() {
        state.set_notice("Wait for the save to finish before removing receipts");
        return Vec::new();
    }
    let Some(batch) = state.batch.as_mut() else {
        return Vec::new();
    };
    let Some(position) = batch.entries.iter().position(|entry| entry.file.key == key) else {
        return Vec::new();
    };

    let entry = batch.entries.remove(position);
    let has_open = batch.has_open_jobs();
    state.mark_dirty();

    let mut effects = Vec::new();
    if let Some(job_id) = entry.cancellable_job() {
        effects.push(Effect::CancelJob {
            job_id: job_id.clone(),
        });
    }
    if state.poller == PollerState::Polling && !has_open {
        effects.extend(drain(state));
    }
    effects
}

fn drain(state: &mut AppState) -> Vec<Effect> {
    state.poller = PollerState::Drained;
    state.notice = None;
    state.mark_dirty();
    vec![Effect::StopPolling]
}

fn begin_save(state: &mut AppState, today: NaiveDate) -> Vec<Effect> {
    if state.saving.is_some() {
        state.set_notice("A save is already in progress");
        return Vec::new();
    }
    let Some(batch) = state.batch.as_ref().filter(|batch| !batch.entries.is_empty()) else {
        state.set_notice("Nothing to save");
        return Vec::new();
    };
    if batch.submitting || !batch.all_resolved() {
        let waiting = batch
            .entries
            .iter()
            .filter(|entry| entry.result.is_none())
            .count();
        state.set_notice(format!(
            "Waiting for {waiting} receipt(s) to finish processing"
        ));
        return Vec::new();
    }

    let batch_id = batch.id;
    let mut skipped = 0;
    let mut items = Vec::new();
    for entry in batch.entries.iter().filter(|entry| !entry.saved) {
        match &entry.result {
            Some(JobResult::Completed {
                extracted,
                file_path,
                job_id,
            }) => items.push((
                entry.file.key,
                NewReceipt {
                    file_path: file_path.clone(),
                    original_name: entry.file.original_name.clone(),
                    extracted: extracted.clone(),
                    job_id: job_id.clone(),
                    month_year: month_year_key(extracted.date.as_deref(), today),
                },
            )),
            _ => skipped += 1,
        }
    }

    if items.is_empty() {
        state.last_save = Some(SaveReport {
            status: SaveStatus::NothingToSave,
            attempted: 0,
            saved: Vec::new(),
            duplicates: Vec::new(),
            errors: Vec::new(),
            skipped,
        });
        state.set_notice(format!("Nothing to save, {skipped} failed receipt(s) skipped"));
        return Vec::new();
    }

    state.saving = Some(SaveInFlight { batch_id, skipped });
    state.set_notice(format!("Saving {} receipt(s)", items.len()));
    vec![Effect::SaveReceipts { batch_id, items }]
}

fn finish_save(state: &mut AppState, batch_id: BatchId, outcomes: Vec<SaveOutcome>) -> Vec<Effect> {
    let Some(in_flight) = state.saving.filter(|in_flight| in_flight.batch_id == batch_id) else {
        // A save nobody is waiting for any more still produced records.
        for outcome in outcomes {
            if let Ok(receipt) = outcome.result {
                state.saved.push(receipt);
                state.mark_dirty();
            }
        }
        return Vec::new();
    };
    state.saving = None;
    let skipped = in_flight.skipped;

    let attempted = outcomes.len();
    let mut saved_names = Vec::new();
    let mut duplicates = Vec::new();
    let mut errors = Vec::new();

    for SaveOutcome { key, result } in outcomes {
        let name = entry_name(state, key);
        match result {
            Ok(receipt) => {
                let name = name
                    .or_else(|| receipt.original_name.clone())
                    .unwrap_or_else(|| receipt.file_path.clone());
                if let Some(entry) = state.batch.as_mut().and_then(|batch| batch.entry_mut(key)) {
                    entry.saved = true;
                }
                saved_names.push(name);
                state.saved.push(receipt);
            }
            Err(SaveFailure::Duplicate(_)) => {
                duplicates.push(name.unwrap_or_else(|| format!("file #{key}")))
            }
            Err(SaveFailure::Rejected(reason)) => {
                errors.push((name.unwrap_or_else(|| format!("file #{key}")), reason))
            }
        }
    }

    let status = if saved_names.len() == attempted {
        SaveStatus::AllSaved
    } else if saved_names.is_empty() {
        SaveStatus::AllFailed
    } else {
        SaveStatus::Partial
    };

    if status == SaveStatus::AllSaved && state.batch_id() == Some(batch_id) {
        state.batch = None;
        state.poller = PollerState::Idle;
    }

    let report = SaveReport {
        status,
        attempted,
        saved: saved_names,
        duplicates,
        errors,
        skipped,
    };
    state.set_notice(save_summary(&report));
    state.last_save = Some(report);
    Vec::new()
}

fn entry_name(state: &AppState, key: FileKey) -> Option<String> {
    state
        .entries()
        .iter()
        .find(|entry| entry.file.key == key)
        .map(|entry| entry.file.original_name.clone())
}

fn save_summary(report: &SaveReport) -> String {
    let mut summary = match report.status {
        SaveStatus::AllSaved => format!("Saved {} receipt(s)", report.saved.len()),
        SaveStatus::Partial => format!(
            "Saved {} of {} receipt(s), {} need attention",
            report.saved.len(),
            report.attempted,
            report.failures()
        ),
        SaveStatus::AllFailed => format!("No receipts saved, {} failed", report.failures()),
        SaveStatus::NothingToSave => "Nothing to save".to_string(),
    };
    if report.skipped > 0 {
        summary.push_str(&format!(", {} skipped", report.skipped));
    }
    summary
}

fn restore(state: &mut AppState, snapshot: BatchSnapshot) -> Vec<Effect> {
    if snapshot.entries.is_empty() || !state.entries().is_empty() {
        return Vec::new();
    }
    state.restore_batch(snapshot);
    let has_open = state.batch.as_ref().is_some_and(|batch| batch.has_open_jobs());
    if has_open {
        state.poller = PollerState::Polling;
        state.set_notice("Resumed processing of a previous batch");
        vec![Effect::StartPolling {
            interval: state.settings.interval,
        }]
    } else {
        state.poller = PollerState::Drained;
        state.set_notice("Restored a previous batch");
        Vec::new()
    }
}
