//! Receipt engine: backend API client, poll timer and effect execution.
mod api;
mod engine;
mod persist;
mod poll_timer;
mod types;

pub use api::{ApiSettings, ReceiptApi, ReqwestReceiptApi};
pub use engine::{EngineError, EngineEvents, EngineHandle};
pub use persist::{PersistError, StateStore};
pub use poll_timer::PollTimer;
pub use types::{
    ApiError, EngineEvent, FailureKind, JobPayload, JobStatus, JobStatusReport, SaveRequest,
    UploadRequest,
};
