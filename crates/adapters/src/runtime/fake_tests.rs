use super::*;
use crate::runtime::{GetLogsOptions, StartOpts};
use std::path::PathBuf;

fn start_opts(name: &str) -> StartOpts {
    StartOpts {
        container_name: name.to_string(),
        image: "warden/runner:latest".to_string(),
        prompt: "hello".to_string(),
        workspace_path: PathBuf::from("/tmp/ws"),
        credentials_path: PathBuf::from("/tmp/creds"),
        env: Vec::new(),
    }
}

#[tokio::test]
async fn start_then_stream_replays_scripted_lines() {
    let runtime = FakeRuntime::new();
    runtime.seed_container(
        "claude-abc",
        ScriptedContainer { lines: vec!["one".into(), "two".into()], exit_code: Some(0), hangs: false },
    );
    runtime.start_detached(start_opts("claude-abc")).await.unwrap();

    let mut stream = runtime.stream_logs("claude-abc").await.unwrap();
    let mut lines = Vec::new();
    while let Some(line) = stream.lines.recv().await {
        lines.push(line);
    }
    assert_eq!(lines, vec!["one", "two"]);
    assert_eq!(stream.exit_code.await.unwrap(), Some(0));
}

#[tokio::test]
async fn fail_next_spawn_surfaces_once() {
    let runtime = FakeRuntime::new();
    runtime.fail_next_spawn("no capacity");
    let err = runtime.start_detached(start_opts("claude-x")).await.unwrap_err();
    assert!(matches!(err, RuntimeError::SpawnFailed(m) if m == "no capacity"));

    // Second attempt succeeds; the failure was one-shot.
    runtime.start_detached(start_opts("claude-x")).await.unwrap();
}

#[tokio::test]
async fn kill_marks_container_not_running() {
    let runtime = FakeRuntime::new();
    runtime.seed_container("claude-y", ScriptedContainer { hangs: true, ..Default::default() });
    runtime.kill("claude-y").await;
    assert!(runtime.was_killed("claude-y"));
    let status = runtime.get_status("claude-y").await.unwrap();
    assert!(!status.running);
}

#[tokio::test]
async fn get_logs_respects_tail() {
    let runtime = FakeRuntime::new();
    runtime.seed_container(
        "claude-z",
        ScriptedContainer { lines: vec!["a".into(), "b".into(), "c".into()], exit_code: Some(0), hangs: false },
    );
    let tail = runtime.get_logs("claude-z", GetLogsOptions { tail_lines: Some(2) }).await.unwrap();
    assert_eq!(String::from_utf8(tail).unwrap(), "b\nc");
}
