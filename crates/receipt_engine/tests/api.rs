use pretty_assertions::assert_eq;
use receipt_core::{ExtractedFields, NewReceipt};
use receipt_engine::{
    ApiSettings, FailureKind, JobPayload, JobStatus, JobStatusReport, ReceiptApi,
    ReqwestReceiptApi,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ReqwestReceiptApi {
    ReqwestReceiptApi::new(ApiSettings::new(server.uri(), "secret")).expect("client")
}

fn new_receipt() -> NewReceipt {
    NewReceipt {
        file_path: "uploads/abc.jpg".to_string(),
        original_name: "lunch.jpg".to_string(),
        extracted: ExtractedFields {
            shop_name: Some("Cafe Uno".to_string()),
            date: Some("2024-05-03".to_string()),
            amount_due: Some("12.50".to_string()),
            ..ExtractedFields::default()
        },
        job_id: "job-1".to_string(),
        month_year: "2024-05".to_string(),
    }
}

#[tokio::test]
async fn upload_sends_multipart_receipt_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receipts/upload"))
        .and(header("authorization", "Bearer secret"))
        .and(body_string_contains("name=\"receipt\""))
        .and(body_string_contains("filename=\"lunch.jpg\""))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "jobId": "job-7" })))
        .expect(1)
        .mount(&server)
        .await;

    let job_id = client(&server)
        .upload("lunch.jpg", b"jpeg bytes".to_vec())
        .await
        .expect("upload ok");
    assert_eq!(job_id, "job-7");
}

#[tokio::test]
async fn upload_without_job_id_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receipts/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let err = client(&server)
        .upload("lunch.jpg", vec![1, 2, 3])
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
}

#[tokio::test]
async fn job_status_reads_completed_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/receipts/jobs/job-7"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "result": {
                "extracted": { "shopName": "Cafe Uno", "amountDue": 12.5, "TIN": "123-456" },
                "filePath": "uploads/abc.jpg"
            }
        })))
        .mount(&server)
        .await;

    let report = client(&server).job_status("job-7").await.expect("status");
    assert_eq!(report.status, JobStatus::Completed);
    let JobPayload {
        extracted,
        file_path,
    } = report.result.expect("result");
    assert_eq!(file_path, "uploads/abc.jpg");
    assert_eq!(extracted.shop_name.as_deref(), Some("Cafe Uno"));
    assert_eq!(extracted.amount_due.as_deref(), Some("12.5"));
    assert_eq!(extracted.tin.as_deref(), Some("123-456"));
}

#[tokio::test]
async fn job_status_reads_pending_and_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/receipts/jobs/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/receipts/jobs/job-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "error": "image too blurry"
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    assert_eq!(
        api.job_status("job-1").await.unwrap(),
        JobStatusReport {
            status: JobStatus::Pending,
            result: None,
            error: None,
        }
    );
    let failed = api.job_status("job-2").await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("image too blurry"));
}

#[tokio::test]
async fn http_errors_carry_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/receipts/jobs/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Job not found" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).job_status("gone").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert_eq!(err.message, "Job not found");
    assert_eq!(err.to_string(), "http status 404: Job not found");
}

#[tokio::test]
async fn cancel_deletes_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/receipts/jobs/job-3"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).cancel_job("job-3").await.expect("cancelled");
}

#[tokio::test]
async fn save_posts_camel_case_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receipts"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "filePath": "uploads/abc.jpg",
            "originalName": "lunch.jpg",
            "jobId": "job-1",
            "monthYear": "2024-05",
            "extracted": { "shopName": "Cafe Uno" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_id": "r-1",
            "filePath": "uploads/abc.jpg",
            "originalName": "lunch.jpg",
            "jobId": "job-1",
            "monthYear": "2024-05"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let saved = client(&server)
        .save_receipt(&new_receipt())
        .await
        .expect("saved");
    assert_eq!(saved.id.as_deref(), Some("r-1"));
    assert_eq!(saved.month_year.as_deref(), Some("2024-05"));
}

#[tokio::test]
async fn save_with_empty_body_echoes_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receipts"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let saved = client(&server).save_receipt(&new_receipt()).await.unwrap();
    assert_eq!(saved.id, None);
    assert_eq!(saved.file_path, "uploads/abc.jpg");
    assert_eq!(saved.job_id.as_deref(), Some("job-1"));
}

#[tokio::test]
async fn conflict_maps_to_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receipts"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "error": "Receipt already saved" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .save_receipt(&new_receipt())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Duplicate);
    assert_eq!(err.message, "Receipt already saved");
}

#[tokio::test]
async fn list_accepts_bare_and_wrapped_arrays() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/receipts"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "receipts": [
                { "_id": "a", "filePath": "uploads/a.jpg", "monthYear": "2024-04" },
                { "_id": "b", "filePath": "uploads/b.jpg", "monthYear": "2024-05" }
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/receipts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "c", "filePath": "uploads/c.jpg" }
        ])))
        .mount(&server)
        .await;

    let api = client(&server);
    let wrapped = api.list_receipts().await.unwrap();
    let ids: Vec<_> = wrapped.iter().filter_map(|r| r.id.as_deref()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let bare = api.list_receipts().await.unwrap();
    assert_eq!(bare.len(), 1);
    assert_eq!(bare[0].file_path, "uploads/c.jpg");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_failure() {
    // Pooled mock servers keep listening after drop, so take a port nobody serves.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let api = ReqwestReceiptApi::new(ApiSettings::new(uri, "secret")).unwrap();
    let err = api.list_receipts().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Network);
}
