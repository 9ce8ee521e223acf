use super::*;
use yare::parameterized;

#[test]
fn sanitizes_unsafe_characters() {
    let key = SessionKey::new("user@example.com/project#1");
    let name = container_name_from_session_key(&key);
    assert_eq!(name, "claude-user-example-com-project-1");
}

#[test]
fn empty_session_key_round_trips_through_prefix() {
    let key = SessionKey::new("");
    let name = container_name_from_session_key(&key);
    assert_eq!(name, "claude-");
    let back = session_key_from_container_name(&name).unwrap();
    assert_eq!(back.as_str(), "");
}

#[parameterized(
    plain = { "claude-abc-123" },
    single_char = { "claude-a" },
    digits_only = { "claude-0001" },
)]
fn round_trips_on_already_sanitized_names(name: &str) {
    let key = session_key_from_container_name(name).unwrap();
    assert_eq!(container_name_from_session_key(&key), name);
}

#[test]
fn unrecognized_prefix_returns_none() {
    assert!(session_key_from_container_name("other-container").is_none());
}
