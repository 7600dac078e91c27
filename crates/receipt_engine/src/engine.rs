use std::io;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use futures_util::future::join_all;
use intake_logging::{intake_debug, intake_info, intake_warn};
use receipt_core::{BatchId, FileKey, JobId};
use thiserror::Error;

use crate::api::{ApiSettings, ReceiptApi, ReqwestReceiptApi};
use crate::poll_timer::PollTimer;
use crate::{ApiError, EngineEvent, FailureKind, SaveRequest, UploadRequest};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to spawn engine thread: {0}")]
    Thread(#[source] io::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

enum EngineCommand {
    StartPolling { interval: Duration },
    StopPolling,
    Api(ApiCommand),
}

enum ApiCommand {
    SubmitBatch {
        batch_id: BatchId,
        uploads: Vec<UploadRequest>,
    },
    CheckJobs {
        checks: Vec<(FileKey, JobId)>,
    },
    CancelJob {
        job_id: JobId,
    },
    SaveReceipts {
        batch_id: BatchId,
        items: Vec<SaveRequest>,
    },
    ListReceipts,
}

/// Front door to the IO worker. Commands are fire-and-forget; every
/// completion comes back as an [`EngineEvent`].
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineHandle {
    pub fn new(settings: ApiSettings) -> Result<Self, EngineError> {
        let api = ReqwestReceiptApi::new(settings)?;
        Self::with_api(Arc::new(api))
    }

    pub fn with_api(api: Arc<dyn ReceiptApi>) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("receipt-engine-io")
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;

        thread::Builder::new()
            .name("receipt-engine".to_string())
            .spawn(move || {
                let mut timer = PollTimer::new(runtime.handle().clone());
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        EngineCommand::StartPolling { interval } => {
                            let tick_tx = event_tx.clone();
                            timer.start(interval, move || {
                                tick_tx.send(EngineEvent::PollTick).is_ok()
                            });
                            intake_debug!("Poll timer started ({} ms)", interval.as_millis());
                        }
                        EngineCommand::StopPolling => {
                            if timer.stop() {
                                intake_debug!("Poll timer stopped");
                            }
                        }
                        EngineCommand::Api(command) => {
                            let api = api.clone();
                            let event_tx = event_tx.clone();
                            runtime.spawn(async move {
                                handle_command(api.as_ref(), command, &event_tx).await;
                            });
                        }
                    }
                }
                timer.stop();
            })
            .map_err(EngineError::Thread)?;

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }

    /// Uploads run one after another; `SubmissionFinished` follows the last one.
    pub fn submit_batch(&self, batch_id: BatchId, uploads: Vec<UploadRequest>) {
        self.send(EngineCommand::Api(ApiCommand::SubmitBatch { batch_id, uploads }));
    }

    /// Replaces any running timer.
    pub fn start_polling(&self, interval: Duration) {
        self.send(EngineCommand::StartPolling { interval });
    }

    pub fn stop_polling(&self) {
        self.send(EngineCommand::StopPolling);
    }

    pub fn check_jobs(&self, checks: Vec<(FileKey, JobId)>) {
        self.send(EngineCommand::Api(ApiCommand::CheckJobs { checks }));
    }

    /// Best effort; failures are only logged.
    pub fn cancel_job(&self, job_id: JobId) {
        self.send(EngineCommand::Api(ApiCommand::CancelJob { job_id }));
    }

    pub fn save_receipts(&self, batch_id: BatchId, items: Vec<SaveRequest>) {
        self.send(EngineCommand::Api(ApiCommand::SaveReceipts { batch_id, items }));
    }

    pub fn list_receipts(&self) {
        self.send(EngineCommand::Api(ApiCommand::ListReceipts));
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Receive side only. Holding it does not keep the worker alive.
    pub fn events(&self) -> EngineEvents {
        EngineEvents {
            event_rx: Arc::clone(&self.event_rx),
        }
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            intake_warn!("Engine worker is gone; command dropped");
        }
    }
}

/// Event stream of an [`EngineHandle`]. It disconnects once every handle is
/// dropped and the worker has shut down.
#[derive(Clone)]
pub struct EngineEvents {
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineEvents {
    pub fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
        match self.event_rx.lock() {
            Ok(event_rx) => event_rx.recv_timeout(timeout),
            Err(_) => Err(RecvTimeoutError::Disconnected),
        }
    }
}

async fn handle_command(
    api: &dyn ReceiptApi,
    command: ApiCommand,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    match command {
        ApiCommand::SubmitBatch { batch_id, uploads } => {
            intake_info!("Submitting batch {} ({} file(s))", batch_id, uploads.len());
            for upload in uploads {
                let result = upload_file(api, &upload).await;
                match &result {
                    Ok(job_id) => intake_info!("Uploaded {} as job {}", upload.original_name, job_id),
                    Err(err) => intake_warn!("Upload of {} failed: {}", upload.original_name, err),
                }
                let _ = event_tx.send(EngineEvent::UploadFinished {
                    key: upload.key,
                    result,
                });
            }
            let _ = event_tx.send(EngineEvent::SubmissionFinished { batch_id });
        }
        ApiCommand::CheckJobs { checks } => {
            join_all(checks.into_iter().map(|(key, job_id)| async move {
                let result = api.job_status(&job_id).await;
                let _ = event_tx.send(EngineEvent::JobChecked {
                    key,
                    job_id,
                    result,
                });
            }))
            .await;
        }
        ApiCommand::CancelJob { job_id } => match api.cancel_job(&job_id).await {
            Ok(()) => intake_debug!("Cancelled job {}", job_id),
            Err(err) => intake_warn!("Cancelling job {} failed: {}", job_id, err),
        },
        ApiCommand::SaveReceipts { batch_id, items } => {
            let mut outcomes = Vec::with_capacity(items.len());
            for item in items {
                let result = api.save_receipt(&item.receipt).await;
                if let Err(err) = &result {
                    intake_warn!("Saving {} failed: {}", item.receipt.original_name, err);
                }
                outcomes.push((item.key, result));
            }
            let _ = event_tx.send(EngineEvent::SaveFinished { batch_id, outcomes });
        }
        ApiCommand::ListReceipts => {
            let result = api.list_receipts().await;
            let _ = event_tx.send(EngineEvent::ReceiptsListed(result));
        }
    }
}

async fn upload_file(api: &dyn ReceiptApi, upload: &UploadRequest) -> Result<JobId, ApiError> {
    check_upload_type(&upload.path)?;
    let bytes = tokio::fs::read(&upload.path).await.map_err(|err| {
        ApiError::new(
            FailureKind::FileRead,
            format!("{}: {err}", upload.path.display()),
        )
    })?;
    api.upload(&upload.original_name, bytes).await
}

/// Receipts arrive as photos or scanned PDFs.
fn check_upload_type(path: &Path) -> Result<(), ApiError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let accepted = mime.type_().as_str() == "image" || mime.essence_str() == "application/pdf";
    if accepted {
        return Ok(());
    }
    Err(ApiError::new(
        FailureKind::UnsupportedFile {
            mime: mime.essence_str().to_string(),
        },
        path.display().to_string(),
    ))
}
