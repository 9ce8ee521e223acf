use super::*;
use tokio::net::UnixListener;

async fn serve_once(listener: UnixListener, response: Response) {
    let (stream, _) = listener.accept().await.expect("accept");
    let (mut reader, mut writer) = stream.into_split();
    let _request_bytes = protocol::read_message(&mut reader).await.expect("read request");
    let data = protocol::encode(&response).expect("encode");
    protocol::write_message(&mut writer, &data).await.expect("write response");
}

#[tokio::test]
async fn send_round_trips_a_ping_over_the_socket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("wardend.sock");
    let listener = UnixListener::bind(&socket_path).expect("bind");

    let server = tokio::spawn(serve_once(listener, Response::Pong));
    let client = DaemonClient { socket_path };
    let response = client.send(&Request::Ping).await.expect("send");
    assert!(matches!(response, Response::Pong));
    server.await.expect("server task");
}

#[tokio::test]
async fn send_reports_an_io_error_when_nothing_is_listening() {
    let dir = tempfile::tempdir().expect("tempdir");
    let client = DaemonClient { socket_path: dir.path().join("absent.sock") };
    let err = client.send(&Request::Ping).await.expect_err("expected failure");
    assert!(matches!(err, ClientError::Io(_)));
}

#[tokio::test]
async fn connect_reuses_a_socket_path_from_config_without_probing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("wardend.sock");
    let listener = UnixListener::bind(&socket_path).expect("bind");
    let server = tokio::spawn(serve_once(listener, Response::Sessions { sessions: vec![] }));

    let mut config = test_config(dir.path());
    config.socket_path = socket_path;
    let client = DaemonClient::connect(&config).await.expect("connect");
    let response = client.send(&Request::Sessions).await.expect("send");
    assert!(matches!(response, Response::Sessions { sessions } if sessions.is_empty()));
    server.await.expect("server task");
}

fn test_config(dir: &std::path::Path) -> Config {
    Config {
        sessions_dir: dir.join("sessions"),
        workspaces_dir: dir.join("workspaces"),
        socket_path: dir.join("wardend.sock"),
        lock_path: dir.join("wardend.pid"),
        log_path: dir.join("wardend.log"),
        image: "warden/runner:latest".to_string(),
        webhook_url: None,
        session_idle_timeout: std::time::Duration::from_secs(3600),
        startup_timeout: std::time::Duration::from_secs(120),
        output_idle_timeout: std::time::Duration::from_secs(600),
    }
}
