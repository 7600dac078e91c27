#![allow(dead_code)]

use std::path::PathBuf;

use chrono::NaiveDate;
use receipt_core::{
    update, AppState, BatchId, Effect, ExtractedFields, FileKey, JobCheck, Msg,
};

pub fn init_logging() {
    intake_logging::initialize_for_tests();
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()
}

/// Selects `names` as a new batch and returns the batch id and file keys in order.
pub fn select(state: AppState, names: &[&str]) -> (AppState, BatchId, Vec<FileKey>) {
    let paths = names.iter().map(|name| PathBuf::from(format!("/tmp/{name}"))).collect();
    let (state, effects) = update(state, Msg::FilesSelected(paths));
    let (batch_id, keys) = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::SubmitBatch { batch_id, uploads } => {
                Some((*batch_id, uploads.iter().map(|upload| upload.key).collect()))
            }
            _ => None,
        })
        .expect("submit effect");
    (state, batch_id, keys)
}

pub fn uploaded(state: AppState, key: FileKey, job_id: &str) -> AppState {
    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            key,
            result: Ok(job_id.to_string()),
        },
    );
    assert!(effects.is_empty());
    state
}

pub fn upload_failed(state: AppState, key: FileKey, error: &str) -> AppState {
    let (state, _) = update(
        state,
        Msg::UploadFinished {
            key,
            result: Err(error.to_string()),
        },
    );
    state
}

/// Uploads every file successfully as `job-<position>` and finishes submission.
pub fn polling_batch(names: &[&str]) -> (AppState, BatchId, Vec<FileKey>) {
    let (mut state, batch_id, keys) = select(AppState::new(), names);
    for (position, key) in keys.iter().enumerate() {
        state = uploaded(state, *key, &job(position));
    }
    let (state, effects) = update(state, Msg::SubmissionFinished { batch_id });
    assert!(matches!(effects.as_slice(), [Effect::StartPolling { .. }]));
    (state, batch_id, keys)
}

pub fn job(position: usize) -> String {
    format!("job-{position}")
}

pub fn tick(state: AppState) -> (AppState, Vec<Effect>) {
    update(state, Msg::PollTick)
}

pub fn check(
    state: AppState,
    key: FileKey,
    job_id: &str,
    check: JobCheck,
) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::JobChecked {
            key,
            job_id: job_id.to_string(),
            check: Ok(check),
        },
    )
}

pub fn completed(shop: &str, date: &str) -> JobCheck {
    JobCheck::Completed {
        extracted: ExtractedFields {
            shop_name: Some(shop.to_string()),
            date: Some(date.to_string()),
            amount_due: Some("10.00".to_string()),
            ..ExtractedFields::default()
        },
        file_path: format!("uploads/{shop}.jpg"),
    }
}

pub fn failed(error: &str) -> JobCheck {
    JobCheck::Failed {
        error: error.to_string(),
    }
}

pub fn checked_keys(effects: &[Effect]) -> Vec<FileKey> {
    effects
        .iter()
        .flat_map(|effect| match effect {
            Effect::CheckJobs { checks } => checks.iter().map(|(key, _)| *key).collect(),
            _ => Vec::new(),
        })
        .collect()
}
