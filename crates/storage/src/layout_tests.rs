use super::*;

#[test]
fn session_and_job_paths_follow_the_contract() {
    let layout = Layout::new("/state/sessions", "/state/workspaces");
    let key = SessionKey::new("abc");
    let job_id = JobId::new("job-1");

    assert_eq!(layout.session_file(&key), PathBuf::from("/state/sessions/abc/session.json"));
    assert_eq!(layout.credentials_dir(&key), PathBuf::from("/state/sessions/abc/.claude"));
    assert_eq!(layout.job_file(&key, &job_id), PathBuf::from("/state/sessions/abc/jobs/job-1.json"));
    assert_eq!(layout.job_output_file(&key, &job_id), PathBuf::from("/state/sessions/abc/jobs/job-1.log"));
    assert_eq!(layout.workspace_dir(&key), PathBuf::from("/state/workspaces/abc"));
}

#[test]
fn expand_home_leaves_absolute_paths_untouched() {
    assert_eq!(expand_home("/already/absolute"), PathBuf::from("/already/absolute"));
}
