use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use receipt_core::{JobId, NewReceipt, SavedReceipt};

use crate::{ApiError, FailureKind, JobStatusReport};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The receipt endpoints of the backend.
#[async_trait::async_trait]
pub trait ReceiptApi: Send + Sync {
    /// `POST /api/receipts/upload`; returns the id of the extraction job.
    async fn upload(&self, original_name: &str, bytes: Vec<u8>) -> Result<JobId, ApiError>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ApiError>;

    /// Cancels the job and discards its uploaded image.
    async fn cancel_job(&self, job_id: &str) -> Result<(), ApiError>;

    /// Fails with [`FailureKind::Duplicate`] when the receipt already exists.
    async fn save_receipt(&self, receipt: &NewReceipt) -> Result<SavedReceipt, ApiError>;

    async fn list_receipts(&self) -> Result<Vec<SavedReceipt>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestReceiptApi {
    settings: ApiSettings,
    base: Url,
    client: reqwest::Client,
}

impl ReqwestReceiptApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            settings,
            base,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::new(FailureKind::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.settings.token)
    }
}

#[async_trait::async_trait]
impl ReceiptApi for ReqwestReceiptApi {
    async fn upload(&self, original_name: &str, bytes: Vec<u8>) -> Result<JobId, ApiError> {
        let mime = mime_guess::from_path(original_name).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(original_name.to_string())
            .mime_str(mime.as_ref())
            .map_err(map_reqwest_error)?;
        let form = Form::new().part("receipt", part);

        let url = self.endpoint(&["api", "receipts", "upload"])?;
        let response = self
            .authorized(self.client.post(url))
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let accepted: UploadAccepted = read_json(ensure_success(response).await?).await?;
        Ok(accepted.job_id)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ApiError> {
        let url = self.endpoint(&["api", "receipts", "jobs", job_id])?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(ensure_success(response).await?).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "receipts", "jobs", job_id])?;
        let response = self
            .authorized(self.client.delete(url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response).await.map(drop)
    }

    async fn save_receipt(&self, receipt: &NewReceipt) -> Result<SavedReceipt, ApiError> {
        let url = self.endpoint(&["api", "receipts"])?;
        let response = self
            .authorized(self.client.post(url))
            .json(receipt)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = ensure_success(response)
            .await?
            .text()
            .await
            .map_err(map_reqwest_error)?;
        Ok(parse_saved_receipt(&body).unwrap_or_else(|| SavedReceipt::from_new(receipt)))
    }

    async fn list_receipts(&self) -> Result<Vec<SavedReceipt>, ApiError> {
        let url = self.endpoint(&["api", "receipts"])?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let listing: ReceiptListing = read_json(ensure_success(response).await?).await?;
        Ok(match listing {
            ReceiptListing::Bare(receipts) | ReceiptListing::Wrapped { receipts } => receipts,
        })
    }
}

#[derive(Deserialize)]
struct UploadAccepted {
    #[serde(rename = "jobId", alias = "job_id", deserialize_with = "job_id_text")]
    job_id: JobId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReceiptListing {
    Bare(Vec<SavedReceipt>),
    Wrapped { receipts: Vec<SavedReceipt> },
}

/// Queue backends hand out numeric ids as often as string ones.
fn job_id_text<'de, D>(deserializer: D) -> Result<JobId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) if !text.is_empty() => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(D::Error::custom(format!("unusable job id {other}"))),
    }
}

/// Accepts the record itself or `{ "receipt": { ... } }`; `None` for an empty body.
fn parse_saved_receipt(body: &str) -> Option<SavedReceipt> {
    let value: Value = serde_json::from_str(body).ok()?;
    let record = match value.get("receipt") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => value,
    };
    serde_json::from_value::<SavedReceipt>(record)
        .ok()
        .filter(|saved| !saved.file_path.is_empty())
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = server_message(&body).unwrap_or_else(|| status.to_string());
    let kind = if status == StatusCode::CONFLICT {
        FailureKind::Duplicate
    } else {
        FailureKind::HttpStatus(status.as_u16())
    };
    Err(ApiError::new(kind, message))
}

fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|field| value.get(field)?.as_str().map(str::to_string))
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
