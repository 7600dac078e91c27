use receipt_core::{
    group_by_month, AppViewModel, ExtractedFields, FileRowView, PollerState, SaveReport,
    SavedReceipt, SlotStatus,
};

/// Batch overview: one header line, then one line per file. Positions are 1-based,
/// matching what `remove` accepts.
pub fn status_lines(view: &AppViewModel) -> Vec<String> {
    let Some(batch_id) = view.batch_id else {
        return vec!["No receipts in the current batch".to_string()];
    };

    let phase = if view.submitting {
        "uploading"
    } else {
        match view.poller {
            PollerState::Idle => "idle",
            PollerState::Polling => "processing",
            PollerState::Drained => "done",
        }
    };
    let mut header = format!(
        "Batch {} | {} | {} file(s), {} processing",
        batch_id,
        phase,
        view.files.len(),
        view.open_jobs
    );
    if view.saving {
        header.push_str(" | saving");
    } else if view.can_save {
        header.push_str(" | ready to save");
    }

    let mut lines = vec![header];
    lines.extend(view.files.iter().map(file_line));
    lines
}

fn file_line(row: &FileRowView) -> String {
    let status = match &row.status {
        SlotStatus::Uploading => "uploading".to_string(),
        SlotStatus::Processing => match &row.job_id {
            Some(job_id) => format!("processing (job {job_id})"),
            None => "processing".to_string(),
        },
        SlotStatus::Completed(fields) => fields_summary(fields)
            .unwrap_or_else(|| "completed, no fields extracted".to_string()),
        SlotStatus::Failed(error) => format!("failed: {error}"),
    };
    let saved = if row.saved { " [saved]" } else { "" };
    format!("{:>3}. {}  {}{}", row.position + 1, row.original_name, status, saved)
}

fn fields_summary(fields: &ExtractedFields) -> Option<String> {
    let parts: Vec<String> = [
        fields.shop_name.clone(),
        fields.date.clone(),
        fields.amount_due.clone(),
        fields.tin.as_ref().map(|tin| format!("TIN {tin}")),
    ]
    .into_iter()
    .flatten()
    .collect();

    (!parts.is_empty()).then(|| parts.join(" | "))
}

/// Per-receipt detail of a Save All; the headline is the state's notice.
pub fn report_lines(report: &SaveReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .saved
        .iter()
        .map(|name| format!("  saved: {name}"))
        .collect();
    lines.extend(
        report
            .duplicates
            .iter()
            .map(|name| format!("  already saved: {name}")),
    );
    lines.extend(
        report
            .errors
            .iter()
            .map(|(name, reason)| format!("  not saved: {name} ({reason})")),
    );
    if report.skipped > 0 {
        lines.push(format!(
            "  skipped {} failed receipt(s)",
            report.skipped
        ));
    }
    lines
}

pub fn saved_lines(receipts: &[SavedReceipt]) -> Vec<String> {
    if receipts.is_empty() {
        return vec!["No saved receipts".to_string()];
    }

    let mut lines = Vec::new();
    for (month, group) in group_by_month(receipts) {
        lines.push(format!("{month} ({})", group.len()));
        for receipt in group {
            let name = receipt
                .original_name
                .as_deref()
                .unwrap_or(receipt.file_path.as_str());
            match fields_summary(&receipt.extracted) {
                Some(summary) => lines.push(format!("  - {name}  {summary}")),
                None => lines.push(format!("  - {name}")),
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use receipt_core::SaveStatus;

    fn row(position: usize, name: &str, status: SlotStatus) -> FileRowView {
        FileRowView {
            position,
            key: position as u64 + 10,
            original_name: name.to_string(),
            job_id: Some(format!("job-{position}")),
            status,
            saved: false,
        }
    }

    #[test]
    fn empty_view_says_so() {
        assert_eq!(
            status_lines(&AppViewModel::default()),
            vec!["No receipts in the current batch".to_string()]
        );
    }

    #[test]
    fn rows_show_one_based_positions_and_slot_states() {
        let fields = ExtractedFields {
            shop_name: Some("Cafe Uno".to_string()),
            date: Some("2024-05-03".to_string()),
            amount_due: Some("12.50".to_string()),
            tin: Some("123-456".to_string()),
            ..ExtractedFields::default()
        };
        let mut saved = row(1, "b.jpg", SlotStatus::Completed(fields));
        saved.saved = true;
        let view = AppViewModel {
            batch_id: Some(3),
            poller: PollerState::Polling,
            files: vec![
                row(0, "a.jpg", SlotStatus::Processing),
                saved,
                row(2, "c.jpg", SlotStatus::Failed("image too blurry".to_string())),
            ],
            open_jobs: 1,
            ..AppViewModel::default()
        };

        assert_eq!(
            status_lines(&view),
            vec![
                "Batch 3 | processing | 3 file(s), 1 processing".to_string(),
                "  1. a.jpg  processing (job job-0)".to_string(),
                "  2. b.jpg  Cafe Uno | 2024-05-03 | 12.50 | TIN 123-456 [saved]".to_string(),
                "  3. c.jpg  failed: image too blurry".to_string(),
            ]
        );
    }

    #[test]
    fn header_flags_a_saveable_batch() {
        let view = AppViewModel {
            batch_id: Some(1),
            poller: PollerState::Drained,
            files: vec![row(0, "a.jpg", SlotStatus::Completed(ExtractedFields::default()))],
            can_save: true,
            ..AppViewModel::default()
        };
        let lines = status_lines(&view);
        assert_eq!(lines[0], "Batch 1 | done | 1 file(s), 0 processing | ready to save");
        assert_eq!(lines[1], "  1. a.jpg  completed, no fields extracted");
    }

    #[test]
    fn report_lists_every_outcome() {
        let report = SaveReport {
            status: SaveStatus::Partial,
            attempted: 3,
            saved: vec!["a.jpg".to_string()],
            duplicates: vec!["b.jpg".to_string()],
            errors: vec![("c.jpg".to_string(), "http status 500: boom".to_string())],
            skipped: 1,
        };
        assert_eq!(
            report_lines(&report),
            vec![
                "  saved: a.jpg".to_string(),
                "  already saved: b.jpg".to_string(),
                "  not saved: c.jpg (http status 500: boom)".to_string(),
                "  skipped 1 failed receipt(s)".to_string(),
            ]
        );
    }

    #[test]
    fn saved_receipts_are_grouped_by_month() {
        let receipts = vec![
            SavedReceipt {
                file_path: "uploads/b.jpg".to_string(),
                original_name: Some("taxi.jpg".to_string()),
                month_year: Some("2024-05".to_string()),
                ..SavedReceipt::default()
            },
            SavedReceipt {
                file_path: "uploads/a.jpg".to_string(),
                month_year: Some("2024-04".to_string()),
                extracted: ExtractedFields {
                    shop_name: Some("Kiosk".to_string()),
                    ..ExtractedFields::default()
                },
                ..SavedReceipt::default()
            },
        ];
        assert_eq!(
            saved_lines(&receipts),
            vec![
                "2024-04 (1)".to_string(),
                "  - uploads/a.jpg  Kiosk".to_string(),
                "2024-05 (1)".to_string(),
                "  - taxi.jpg".to_string(),
            ]
        );
        assert_eq!(saved_lines(&[]), vec!["No saved receipts".to_string()]);
    }
}
