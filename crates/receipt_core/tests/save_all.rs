mod common;

use common::*;
use pretty_assertions::assert_eq;
use receipt_core::{
    update, AppState, Effect, FileKey, Msg, NewReceipt, PollerState, SaveFailure, SaveOutcome,
    SaveStatus, SavedReceipt,
};

fn save_items(effects: &[Effect]) -> (u64, Vec<(FileKey, NewReceipt)>) {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::SaveReceipts { batch_id, items } => Some((*batch_id, items.clone())),
            _ => None,
        })
        .expect("save effect")
}

fn saved(receipt: &NewReceipt) -> SavedReceipt {
    SavedReceipt {
        id: Some(format!("rec-{}", receipt.job_id)),
        ..SavedReceipt::from_new(receipt)
    }
}

/// Three files: two extract fine, the middle one fails on the server.
fn two_completed_one_failed() -> (AppState, Vec<FileKey>) {
    let (state, _batch_id, keys) = polling_batch(&["a.jpg", "b.jpg", "c.jpg"]);
    let (state, _) = tick(state);
    let (state, _) = check(state, keys[0], &job(0), completed("Alpha", "2024-02-14"));
    let (state, _) = check(state, keys[1], &job(1), failed("not a receipt"));
    (state, keys)
}

#[test]
fn save_all_waits_until_every_slot_is_resolved() {
    init_logging();
    let (state, keys) = two_completed_one_failed();
    assert!(!state.can_save());

    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    assert!(effects.is_empty());
    assert_eq!(
        state.view().notice.as_deref(),
        Some("Waiting for 1 receipt(s) to finish processing")
    );

    let (state, _) = check(state, keys[2], &job(2), completed("Gamma", ""));
    assert!(state.can_save());
}

#[test]
fn failed_slots_are_skipped_and_reported() {
    init_logging();
    let (state, keys) = two_completed_one_failed();
    let (state, _) = check(state, keys[2], &job(2), completed("Gamma", ""));
    assert_eq!(state.poller(), PollerState::Drained);

    let results = state.results();
    assert_eq!(results.iter().filter(|r| r.is_some_and(|r| r.is_completed())).count(), 2);
    assert_eq!(results.iter().filter(|r| r.is_some_and(|r| !r.is_completed())).count(), 1);

    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    let (batch_id, items) = save_items(&effects);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].0, keys[0]);
    assert_eq!(
        items[0].1,
        NewReceipt {
            file_path: "uploads/Alpha.jpg".to_string(),
            original_name: "a.jpg".to_string(),
            extracted: items[0].1.extracted.clone(),
            job_id: job(0),
            month_year: "2024-02".to_string(),
        }
    );
    // No readable date: grouped under the month the save was requested.
    assert_eq!(items[1].1.month_year, "2024-09");
    assert!(state.view().saving);
    assert!(!state.can_save());

    let outcomes = items
        .iter()
        .map(|(key, receipt)| SaveOutcome {
            key: *key,
            result: Ok(saved(receipt)),
        })
        .collect();
    let (state, effects) = update(state, Msg::SaveFinished { batch_id, outcomes });
    assert!(effects.is_empty());

    let report = state.last_save().expect("report");
    assert_eq!(report.status, SaveStatus::AllSaved);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.saved, vec!["a.jpg", "c.jpg"]);
    assert!(state.files().is_empty());
    assert!(state.results().is_empty());
    assert_eq!(state.saved_receipts().len(), 2);
    assert_eq!(
        state.view().notice.as_deref(),
        Some("Saved 2 receipt(s), 1 skipped")
    );
}

#[test]
fn duplicates_leave_the_batch_for_review() {
    init_logging();
    let (state, _batch_id, keys) = polling_batch(&["a.jpg", "b.jpg", "c.jpg"]);
    let (state, _) = tick(state);
    let (state, _) = check(state, keys[0], &job(0), completed("A", "2024-01-01"));
    let (state, _) = check(state, keys[1], &job(1), completed("B", "2024-01-02"));
    let (state, _) = check(state, keys[2], &job(2), completed("C", "2024-01-03"));

    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    let (batch_id, items) = save_items(&effects);
    let outcomes = vec![
        SaveOutcome {
            key: items[0].0,
            result: Ok(saved(&items[0].1)),
        },
        SaveOutcome {
            key: items[1].0,
            result: Err(SaveFailure::Duplicate("receipt already exists".to_string())),
        },
        SaveOutcome {
            key: items[2].0,
            result: Err(SaveFailure::Rejected("http status 500".to_string())),
        },
    ];
    let (state, _) = update(state, Msg::SaveFinished { batch_id, outcomes });

    let report = state.last_save().expect("report").clone();
    assert_eq!(report.status, SaveStatus::Partial);
    assert_eq!(report.saved.len() + report.failures(), report.attempted);
    assert_eq!(report.duplicates, vec!["b.jpg"]);
    assert_eq!(
        report.errors,
        vec![("c.jpg".to_string(), "http status 500".to_string())]
    );

    // Successes are appended, duplicates are not.
    assert_eq!(state.saved_receipts().len(), 1);
    assert_eq!(state.saved_receipts()[0].job_id, Some(job(0)));

    // The batch stays intact with the saved entry flagged.
    let view = state.view();
    assert_eq!(view.files.len(), 3);
    assert_eq!(
        view.files.iter().map(|row| row.saved).collect::<Vec<_>>(),
        vec![true, false, false]
    );

    // A second Save All only re-sends what is still unsaved.
    let (_state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    let (_, retry) = save_items(&effects);
    assert_eq!(
        retry.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
        vec![keys[1], keys[2]]
    );
}

#[test]
fn all_failed_clears_nothing() {
    init_logging();
    let (state, _batch_id, keys) = polling_batch(&["a.jpg"]);
    let (state, _) = check(state, keys[0], &job(0), completed("A", "2024-01-01"));
    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    let (batch_id, items) = save_items(&effects);

    let outcomes = vec![SaveOutcome {
        key: items[0].0,
        result: Err(SaveFailure::Duplicate("dup".to_string())),
    }];
    let (state, _) = update(state, Msg::SaveFinished { batch_id, outcomes });

    assert_eq!(state.last_save().map(|r| r.status), Some(SaveStatus::AllFailed));
    assert_eq!(state.files().len(), 1);
    assert!(state.saved_receipts().is_empty());
    assert!(state.can_save());
}

#[test]
fn batch_of_only_failures_has_nothing_to_save() {
    init_logging();
    let (state, batch_id, keys) = select(AppState::new(), &["a.jpg", "b.jpg"]);
    let state = upload_failed(state, keys[0], "offline");
    let state = upload_failed(state, keys[1], "offline");
    let (state, _) = update(state, Msg::SubmissionFinished { batch_id });

    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    assert!(effects.is_empty());
    let report = state.last_save().expect("report");
    assert_eq!(report.status, SaveStatus::NothingToSave);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.attempted, 0);
}

#[test]
fn save_with_no_batch_is_refused() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::SaveAllClicked { today: today() });
    assert!(effects.is_empty());
    assert_eq!(state.view().notice.as_deref(), Some("Nothing to save"));
}

#[test]
fn second_click_while_saving_is_refused() {
    init_logging();
    let (state, _batch_id, keys) = polling_batch(&["a.jpg"]);
    let (state, _) = check(state, keys[0], &job(0), completed("A", "2024-01-01"));
    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    assert_eq!(effects.len(), 1);

    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    assert!(effects.is_empty());
    assert_eq!(
        state.view().notice.as_deref(),
        Some("A save is already in progress")
    );
}

#[test]
fn saved_list_loads_and_groups() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::SavedReceiptsRequested);
    assert_eq!(effects, vec![Effect::FetchSavedReceipts]);

    let list = vec![
        SavedReceipt {
            month_year: Some("2024-01".to_string()),
            ..SavedReceipt::default()
        },
        SavedReceipt {
            month_year: Some("2023-12".to_string()),
            ..SavedReceipt::default()
        },
    ];
    let (state, _) = update(state, Msg::SavedReceiptsLoaded(Ok(list)));
    let view = state.view();
    assert!(view.saved_loaded);
    let groups = receipt_core::group_by_month(&view.saved);
    assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["2023-12", "2024-01"]);

    let (state, _) = update(state, Msg::SavedReceiptsLoaded(Err("401 unauthorized".to_string())));
    assert_eq!(
        state.view().notice.as_deref(),
        Some("Could not load saved receipts: 401 unauthorized")
    );
    assert_eq!(state.saved_receipts().len(), 2);
}

#[test]
fn report_for_another_batch_keeps_the_current_headline() {
    init_logging();
    let (state, _batch_id, keys) = polling_batch(&["a.jpg"]);
    let (state, _) = check(state, keys[0], &job(0), completed("A", "2024-01-01"));
    let (state, effects) = update(state, Msg::SaveAllClicked { today: today() });
    let (batch_id, items) = save_items(&effects);

    let stray = SaveOutcome {
        key: items[0].0,
        result: Ok(saved(&items[0].1)),
    };
    let (state, effects) = update(
        state,
        Msg::SaveFinished {
            batch_id: batch_id + 1,
            outcomes: vec![stray],
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.last_save(), None);
    assert_eq!(state.view().notice.as_deref(), Some("Saving 1 receipt(s)"));
    assert_eq!(state.saved_receipts().len(), 1);
    assert!(state.view().saving);
}
