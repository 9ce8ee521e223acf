use super::*;
use tempfile::tempdir;
use warden_adapters::{ContainerListEntry, FakeRuntime, ScriptedContainer};
use warden_core::{FakeClock, JobStatus};
use warden_storage::{FsStore, Layout};

fn fixture() -> (OrphanReconciler, Arc<dyn Store>, FakeRuntime, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let layout = Layout::new(dir.path().join("sessions"), dir.path().join("workspaces"));
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    let store: Arc<dyn Store> = Arc::new(FsStore::new(layout, clock.clone()));
    let runtime = FakeRuntime::new();
    let reconciler = OrphanReconciler::new(store.clone(), Arc::new(runtime.clone()), clock);
    (reconciler, store, runtime, dir)
}

#[tokio::test]
async fn orphan_with_no_active_job_is_removed() {
    let (reconciler, _store, runtime, _dir) = fixture();
    runtime.seed_container("claude-orphan", ScriptedContainer { lines: vec![], exit_code: Some(0), hangs: false });

    reconciler.run().await;

    assert!(runtime.was_killed("claude-orphan"));
}

#[tokio::test]
async fn active_and_running_container_is_left_alone() {
    let (reconciler, store, runtime, _dir) = fixture();
    let session_key = warden_core::SessionKey::new("live");
    store.create_session(&session_key).await.unwrap();
    let job = store.create_job(&session_key, "hello".to_string(), "claude-live".to_string()).await.unwrap();
    store
        .update_job(&session_key, &job.job_id, Box::new(|j: &mut Job| j.status = JobStatus::Running))
        .await
        .unwrap();
    store.set_active_job(&session_key, Some(job.job_id.clone())).await.unwrap();
    runtime.seed_container("claude-live", ScriptedContainer { lines: vec![], exit_code: None, hangs: true });

    reconciler.run().await;

    assert!(!runtime.was_killed("claude-live"));
    let job = store.get_job(&session_key, &job.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
}

#[tokio::test]
async fn active_and_stopped_container_is_reconciled_without_active_pointer() {
    let (reconciler, store, runtime, _dir) = fixture();
    let session_key = warden_core::SessionKey::new("stopped");
    store.create_session(&session_key).await.unwrap();
    let job = store.create_job(&session_key, "hello".to_string(), "claude-stopped".to_string()).await.unwrap();
    store
        .update_job(&session_key, &job.job_id, Box::new(|j: &mut Job| j.status = JobStatus::Running))
        .await
        .unwrap();
    store.set_active_job(&session_key, Some(job.job_id.clone())).await.unwrap();
    runtime.seed_container(
        "claude-stopped",
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

    reconciler.run().await;

    assert!(runtime.was_killed("claude-stopped"));
    let job = store.get_job(&session_key, &job.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.exit_code, Some(0));

    let tail = store.read_job_output_tail(&session_key, &job.job_id, 64).await.unwrap();
    assert_eq!(String::from_utf8(tail.tail).unwrap(), "Hi, world");

    let session = store.get_session(&session_key).await.unwrap().unwrap();
    assert!(session.active_job_id.is_none());
}

#[tokio::test]
async fn container_without_the_recognized_prefix_form_is_skipped() {
    let (reconciler, _store, runtime, _dir) = fixture();
    let entry = ContainerListEntry { name: "unrelated-thing".to_string(), running: false, created_at: None };

    reconciler.reconcile_one(&entry).await.unwrap();

    assert!(!runtime.was_killed("unrelated-thing"));
}
