//! Receipt core: pure batch state machine and view-model helpers.
mod effect;
mod month;
mod msg;
mod receipt;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, PendingUpload};
pub use month::month_year_key;
pub use msg::{JobCheck, Msg, SaveFailure, SaveOutcome};
pub use receipt::{ExtractedFields, NewReceipt, SavedReceipt};
pub use state::{
    AppState, BatchId, BatchSnapshot, FileKey, JobId, JobResult, PollSettings, PollerState,
    SaveReport, SaveStatus, SelectedFile, SnapshotEntry, DEFAULT_MAX_POLL_ATTEMPTS,
    DEFAULT_POLL_INTERVAL,
};
pub use update::update;
pub use view_model::{group_by_month, AppViewModel, FileRowView, SlotStatus};
