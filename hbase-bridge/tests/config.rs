//! Config file loading and archive discovery.

use std::path::PathBuf;

use hbase_bridge::config::{BridgeConfig, ARCHIVE_NAME};
use hbase_bridge::BridgeError;

#[test]
fn file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.toml");
    std::fs::write(
        &path,
        r#"
identity = "da_music"
max_heap = "1g"
check_jni = true
archive_candidates = ["/opt/hbase-gui/java-bridge.jar"]
"#,
    )
    .unwrap();

    let config = BridgeConfig::from_file(&path).unwrap();
    assert_eq!(config.identity, "da_music");
    assert_eq!(config.max_heap, "1g");
    assert!(config.check_jni);
    assert!(!config.verbose);
    assert_eq!(
        config.archive_candidates,
        vec![PathBuf::from("/opt/hbase-gui/java-bridge.jar")]
    );
}

#[test]
fn missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(BridgeConfig::from_file(&dir.path().join("absent.toml")).is_none());
}

#[test]
fn malformed_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.toml");
    std::fs::write(&path, "max_heap = [").unwrap();
    assert!(BridgeConfig::from_file(&path).is_none());
}

#[test]
fn first_existing_candidate_wins() {
    let dir = tempfile::tempdir().unwrap();
    let resources = dir.path().join("Resources");
    std::fs::create_dir(&resources).unwrap();
    let bundled = resources.join(ARCHIVE_NAME);
    let local = dir.path().join(ARCHIVE_NAME);
    std::fs::write(&bundled, b"PK").unwrap();
    std::fs::write(&local, b"PK").unwrap();

    let config = BridgeConfig {
        archive_candidates: vec![dir.path().join("nope").join(ARCHIVE_NAME), bundled.clone(), local],
        ..BridgeConfig::default()
    };
    assert_eq!(config.locate_archive().unwrap(), bundled);
}

#[test]
fn directories_are_not_archives() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join(ARCHIVE_NAME);
    std::fs::create_dir(&fake).unwrap();

    let config = BridgeConfig {
        archive_candidates: vec![fake],
        ..BridgeConfig::default()
    };
    assert!(matches!(
        config.locate_archive(),
        Err(BridgeError::ArchiveNotFound { .. })
    ));
}
