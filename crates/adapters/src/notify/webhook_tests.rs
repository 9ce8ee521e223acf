use super::*;
use warden_core::{JobId, JobStatus, SessionKey};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_payload() -> JobNotification {
    JobNotification {
        job_id: JobId::new("job-1"),
        session_key: SessionKey::new("sess-1"),
        status: JobStatus::Completed,
        elapsed_seconds: 42,
        output_size: 128,
        exit_code: Some(0),
        error_kind: None,
    }
}

#[tokio::test]
async fn posts_payload_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/jobs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(format!("{}/hooks/jobs", server.uri()));
    notifier.notify(sample_payload()).await.unwrap();
}

#[tokio::test]
async fn surfaces_non_success_status_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let notifier = WebhookNotifier::new(server.uri());
    let err = notifier.notify(sample_payload()).await.unwrap_err();
    assert!(matches!(err, NotifyError::DeliveryFailed(_)));
}
