use super::*;
use warden_core::JobStatus;

#[tokio::test]
async fn round_trips_a_request_over_the_wire_framing() {
    let req = Request::Status { job_id: JobId::new("abc"), session_key: Some(SessionKey::new("sess")) };
    let mut buf = Vec::new();
    let bytes = encode(&req).unwrap();
    write_message(&mut buf, &bytes).await.unwrap();

    let mut cursor = std::io::Cursor::new(buf);
    let received = read_message(&mut cursor).await.unwrap();
    let decoded: Request = decode(&received).unwrap();
    assert_eq!(decoded, req);
}

#[tokio::test]
async fn read_message_reports_connection_closed_on_empty_stream() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn start_request_converts_into_a_wire_request() {
    let start = StartRequest {
        prompt: "hello".to_string(),
        session_key: None,
        has_credentials: true,
        credentials_source: None,
    };
    let req: Request = start.into();
    assert!(matches!(req, Request::Start { has_credentials: true, .. }));
}

#[test]
fn api_error_kind_is_stable_across_variants() {
    let e = ApiError::ActiveJobExists("sess".to_string());
    let resp = Response::from_api_error(&e);
    match resp {
        Response::Error { kind, message } => {
            assert_eq!(kind, ApiErrorKind::ActiveJobExists);
            assert!(message.contains("sess"));
        }
        _ => panic!("expected Response::Error"),
    }
}

#[test]
fn output_result_converts_into_a_wire_response() {
    let result = OutputResult { header: "job abc status=running bytes=0-3/3 more=false\n".to_string(), bytes: b"hi!".to_vec() };
    let resp: Response = result.into();
    assert!(matches!(resp, Response::Output { .. }));
}

#[test]
fn status_response_serializes_with_a_type_tag() {
    let result = StatusResult {
        job_id: JobId::new("abc"),
        session_key: SessionKey::new("sess"),
        status: JobStatus::Running,
        elapsed_seconds: 5,
        output_size: 0,
        last_output_seconds_ago: None,
        activity_state: crate::types::ActivityState::Idle,
        tail_output: String::new(),
        exit_code: None,
        error: None,
        metrics: None,
    };
    let resp = Response::Status { result };
    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["type"], "Status");
}
