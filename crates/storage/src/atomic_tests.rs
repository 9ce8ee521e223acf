use super::*;
use std::sync::Arc;
use std::thread;

#[test]
fn write_atomic_creates_file_with_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    write_atomic(&path, b"{\"a\":1}").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"a\":1}");
}

#[test]
fn write_atomic_leaves_no_temp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    write_atomic(&path, b"1").unwrap();
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn concurrent_writes_never_corrupt_the_file() {
    let dir = Arc::new(tempfile::tempdir().unwrap());
    let path = Arc::new(dir.path().join("record.json"));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let path = Arc::clone(&path);
            thread::spawn(move || {
                write_atomic(&path, format!("{{\"writer\":{i}}}").as_bytes()).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let contents = std::fs::read_to_string(&*path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert!(parsed.get("writer").is_some(), "file must contain exactly one proposed record, not a merge");
}
