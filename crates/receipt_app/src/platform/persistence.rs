use intake_logging::{intake_error, intake_info, intake_warn};
use receipt_core::BatchSnapshot;
use receipt_engine::StateStore;

const BATCH_FILENAME: &str = ".receipt_batch.json";

/// The batch left unsaved by the previous session, if any.
pub(crate) fn load_batch(store: &StateStore) -> Option<BatchSnapshot> {
    let path = store.path(BATCH_FILENAME);
    let content = match store.read(BATCH_FILENAME) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(err) => {
            intake_warn!("Failed to read unsaved batch from {:?}: {}", path, err);
            return None;
        }
    };

    let snapshot: BatchSnapshot = match serde_json::from_slice(&content) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            intake_warn!("Failed to parse unsaved batch from {:?}: {}", path, err);
            return None;
        }
    };

    intake_info!(
        "Loaded unsaved batch of {} receipt(s) from {:?}",
        snapshot.entries.len(),
        path
    );
    Some(snapshot).filter(|snapshot| !snapshot.entries.is_empty())
}

/// Writes the unsaved batch, or removes the file when nothing is left to carry over.
pub(crate) fn save_batch(store: &StateStore, snapshot: Option<&BatchSnapshot>) {
    let Some(snapshot) = snapshot.filter(|snapshot| !snapshot.entries.is_empty()) else {
        if let Err(err) = store.remove(BATCH_FILENAME) {
            intake_error!("Failed to remove unsaved batch file: {}", err);
        }
        return;
    };

    let content = match serde_json::to_vec_pretty(snapshot) {
        Ok(bytes) => bytes,
        Err(err) => {
            intake_error!("Failed to serialize unsaved batch: {}", err);
            return;
        }
    };

    match store.write_atomic(BATCH_FILENAME, &content) {
        Ok(path) => intake_info!(
            "Kept {} unsaved receipt(s) in {:?}",
            snapshot.entries.len(),
            path
        ),
        Err(err) => intake_error!("Failed to write unsaved batch to {:?}: {}", store.dir(), err),
    }
}
