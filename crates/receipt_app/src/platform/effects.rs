use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use intake_logging::{intake_debug, intake_info, intake_warn};
use receipt_core::{Effect, JobCheck, Msg, SaveFailure, SaveOutcome};
use receipt_engine::{
    ApiError, EngineEvent, EngineHandle, FailureKind, JobStatus, JobStatusReport, SaveRequest,
    UploadRequest,
};

const EVENT_WAIT: Duration = Duration::from_millis(100);

/// Hands effects to the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, msg_tx: mpsc::Sender<Msg>) -> Self {
        let runner = Self { engine };
        runner.spawn_event_loop(msg_tx);
        runner
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SubmitBatch { batch_id, uploads } => {
                    intake_info!("SubmitBatch batch_id={} files={}", batch_id, uploads.len());
                    let uploads = uploads
                        .into_iter()
                        .map(|upload| UploadRequest {
                            key: upload.key,
                            path: upload.path,
                            original_name: upload.original_name,
                        })
                        .collect();
                    self.engine.submit_batch(batch_id, uploads);
                }
                Effect::StartPolling { interval } => self.engine.start_polling(interval),
                Effect::StopPolling => self.engine.stop_polling(),
                Effect::CheckJobs { checks } => {
                    intake_debug!("CheckJobs jobs={}", checks.len());
                    self.engine.check_jobs(checks);
                }
                Effect::CancelJob { job_id } => {
                    intake_info!("CancelJob job_id={}", job_id);
                    self.engine.cancel_job(job_id);
                }
                Effect::SaveReceipts { batch_id, items } => {
                    intake_info!("SaveReceipts batch_id={} receipts={}", batch_id, items.len());
                    let items = items
                        .into_iter()
                        .map(|(key, receipt)| SaveRequest { key, receipt })
                        .collect();
                    self.engine.save_receipts(batch_id, items);
                }
                Effect::FetchSavedReceipts => self.engine.list_receipts(),
            }
        }
    }

    /// Runs until the engine shuts down or the app stops listening.
    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let events = self.engine.events();
        thread::spawn(move || loop {
            match events.recv_timeout(EVENT_WAIT) {
                Ok(event) => {
                    if msg_tx.send(to_msg(event)).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    intake_debug!("Engine event stream closed");
                    break;
                }
            }
        });
    }
}

fn to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::UploadFinished { key, result } => Msg::UploadFinished {
            key,
            result: result.map_err(|err| err.to_string()),
        },
        EngineEvent::SubmissionFinished { batch_id } => Msg::SubmissionFinished { batch_id },
        EngineEvent::PollTick => Msg::PollTick,
        EngineEvent::JobChecked {
            key,
            job_id,
            result,
        } => {
            let check = match result {
                Ok(report) => Ok(job_check(&job_id, report)),
                Err(err) => {
                    intake_warn!("Status check for job {} failed, retrying: {}", job_id, err);
                    Err(err.to_string())
                }
            };
            Msg::JobChecked { key, job_id, check }
        }
        EngineEvent::SaveFinished { batch_id, outcomes } => Msg::SaveFinished {
            batch_id,
            outcomes: outcomes
                .into_iter()
                .map(|(key, result)| SaveOutcome {
                    key,
                    result: result.map_err(save_failure),
                })
                .collect(),
        },
        EngineEvent::ReceiptsListed(result) => {
            Msg::SavedReceiptsLoaded(result.map_err(|err| err.to_string()))
        }
    }
}

fn job_check(job_id: &str, report: JobStatusReport) -> JobCheck {
    match report.status {
        JobStatus::Pending => JobCheck::Pending,
        JobStatus::Processing => JobCheck::Processing,
        JobStatus::Completed => match report.result {
            Some(payload) => JobCheck::Completed {
                extracted: payload.extracted,
                file_path: payload.file_path,
            },
            None => {
                intake_warn!("Job {} completed without a result", job_id);
                JobCheck::Failed {
                    error: "job completed without a result".to_string(),
                }
            }
        },
        JobStatus::Failed => {
            let error = report
                .error
                .unwrap_or_else(|| "extraction failed".to_string());
            intake_warn!("Job {} failed: {}", job_id, error);
            JobCheck::Failed { error }
        }
    }
}

fn save_failure(err: ApiError) -> SaveFailure {
    match err.kind {
        FailureKind::Duplicate => SaveFailure::Duplicate(err.message),
        _ => SaveFailure::Rejected(err.to_string()),
    }
}
