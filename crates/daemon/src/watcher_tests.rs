use super::*;
use std::sync::Arc;
use tempfile::tempdir;
use warden_adapters::{FakeNotifier, FakeRuntime, ScriptedContainer};
use warden_core::FakeClock;
use warden_storage::{FsStore, Layout};

fn test_deps(runtime: FakeRuntime, notifier: FakeNotifier, clock: Arc<FakeClock>) -> (WatcherDeps, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path().join("sessions"), dir.path().join("workspaces"));
    let store = Arc::new(FsStore::new(layout, clock.clone() as Arc<dyn warden_core::Clock>));
    let deps = WatcherDeps {
        store,
        runtime: Arc::new(runtime),
        notifier: Arc::new(notifier),
        clock,
        startup_timeout: Duration::from_millis(200),
        output_idle_timeout: Duration::from_millis(200),
    };
    (deps, dir)
}

async fn seed_running_job(deps: &WatcherDeps, session_key: &SessionKey, container_name: &str, prompt: &str) -> JobId {
    deps.store.create_session(session_key).await.unwrap();
    let job = deps.store.create_job(session_key, prompt.to_string(), container_name.to_string()).await.unwrap();
    deps.store
        .update_job(session_key, &job.job_id, Box::new(|j: &mut Job| j.status = JobStatus::Running))
        .await
        .unwrap();
    deps.store.set_active_job(session_key, Some(job.job_id.clone())).await.unwrap();
    job.job_id
}

#[tokio::test]
async fn happy_path_completes_and_notifies() {
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    let runtime = FakeRuntime::new();
    runtime.seed_container(
        "claude-s1",
        ScriptedContainer {
            lines: vec![
                r#"{"event":{"type":"content_block_delta","delta":{"text":"Hi"}}}"#.to_string(),
                r#"{"event":{"type":"content_block_delta","delta":{"text":", "}}}"#.to_string(),
                r#"{"event":{"type":"content_block_delta","delta":{"text":"world"}}}"#.to_string(),
            ],
            exit_code: Some(0),
            hangs: false,
        },
    );
    let notifier = FakeNotifier::new();
    let (deps, _dir) = test_deps(runtime, notifier.clone(), clock);
    let session_key = SessionKey::new("s1");
    let job_id = seed_running_job(&deps, &session_key, "claude-s1", "hello").await;

    let (exit_code, signal) = watch_stream(&deps, &session_key, &job_id, "claude-s1").await;
    finalize(&deps, &session_key, &job_id, exit_code, signal).await;

    let job = deps.store.get_job(&session_key, &job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.error_kind, None);

    let tail = deps.store.read_job_output_tail(&session_key, &job_id, 64).await.unwrap();
    assert_eq!(String::from_utf8(tail.tail).unwrap(), "Hi, world");

    let session = deps.store.get_session(&session_key).await.unwrap().unwrap();
    assert!(session.active_job_id.is_none());

    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, JobStatus::Completed);
}

#[tokio::test]
async fn oom_exit_code_classifies_as_oom() {
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    let runtime = FakeRuntime::new();
    runtime.seed_container(
        "claude-s2",
        ScriptedContainer { lines: vec![], exit_code: Some(137), hangs: false },
    );
    let (deps, _dir) = test_deps(runtime, FakeNotifier::new(), clock);
    let session_key = SessionKey::new("s2");
    let job_id = seed_running_job(&deps, &session_key, "claude-s2", "hello").await;

    let (exit_code, signal) = watch_stream(&deps, &session_key, &job_id, "claude-s2").await;
    finalize(&deps, &session_key, &job_id, exit_code, signal).await;

    let job = deps.store.get_job(&session_key, &job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::Oom));
    assert_eq!(job.exit_code, Some(137));
}

#[tokio::test]
async fn rate_limit_forces_failed_on_clean_exit() {
    let clock = Arc::new(FakeClock::new(chrono::DateTime::parse_from_rfc3339("2026-01-01T18:00:00Z").unwrap().with_timezone(&chrono::Utc)));
    let runtime = FakeRuntime::new();
    runtime.seed_container(
        "claude-s3",
        ScriptedContainer {
            lines: vec![
                r#"{"type":"result","is_error":true,"result":"You've hit your limit · resets 8pm (UTC)"}"#.to_string(),
            ],
            exit_code: Some(0),
            hangs: false,
        },
    );
    let (deps, _dir) = test_deps(runtime, FakeNotifier::new(), clock);
    let session_key = SessionKey::new("s3");
    let job_id = seed_running_job(&deps, &session_key, "claude-s3", "hello").await;

    let (exit_code, signal) = watch_stream(&deps, &session_key, &job_id, "claude-s3").await;
    finalize(&deps, &session_key, &job_id, exit_code, signal).await;

    let job = deps.store.get_job(&session_key, &job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::RateLimit));
    assert_eq!(job.exit_code, Some(0));
    assert!(job.error_message.unwrap().contains("120 minutes"));
}

#[tokio::test]
async fn watcher_does_not_overwrite_a_cancelled_job() {
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    let runtime = FakeRuntime::new();
    runtime.seed_container(
        "claude-s4",
        ScriptedContainer { lines: vec![], exit_code: Some(0), hangs: false },
    );
    let notifier = FakeNotifier::new();
    let (deps, _dir) = test_deps(runtime, notifier.clone(), clock);
    let session_key = SessionKey::new("s4");
    let job_id = seed_running_job(&deps, &session_key, "claude-s4", "hello").await;

    // Simulate a race: Cancel beat the watcher to the terminal transition.
    let now = deps.clock.now();
    deps.store
        .update_job(
            &session_key,
            &job_id,
            Box::new(move |j: &mut Job| {
                j.transition_terminal(JobStatus::Cancelled, now, None, None, None).unwrap();
            }),
        )
        .await
        .unwrap();

    let (exit_code, signal) = watch_stream(&deps, &session_key, &job_id, "claude-s4").await;
    finalize(&deps, &session_key, &job_id, exit_code, signal).await;

    let job = deps.store.get_job(&session_key, &job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(notifier.calls().is_empty());
}

#[tokio::test]
async fn transport_failure_after_two_attempts_classifies_as_crash() {
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    let runtime = FakeRuntime::new();
    // No container seeded, so stream_logs always errors "no such container".
    let (deps, _dir) = test_deps(runtime, FakeNotifier::new(), clock);
    let session_key = SessionKey::new("s5");
    let job_id = seed_running_job(&deps, &session_key, "claude-missing", "hello").await;

    let (exit_code, signal) = watch_stream(&deps, &session_key, &job_id, "claude-missing").await;
    finalize(&deps, &session_key, &job_id, exit_code, signal).await;

    let job = deps.store.get_job(&session_key, &job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::Crash));
}
