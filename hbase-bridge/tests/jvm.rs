//! The JNI backend against a real JVM and a stub `HBaseBridge` class.
//!
//! Needs `JAVA_HOME` pointing at a JDK (for `javac` and `jar`); the tests pass
//! without doing anything otherwise. One JVM serves the whole binary.

#![cfg(feature = "jvm")]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use hbase_bridge::config::ARCHIVE_NAME;
use hbase_bridge::{
    Bridge, BridgeConfig, BridgeError, CommandRequest, ErrorKind, JvmLauncher, ScanRequest,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// No `executeCommand`, so that call exercises method resolution failure.
const STUB: &str = r#"
package com.hbasegui.bridge;

public class HBaseBridge {
    private static boolean connected;

    public static boolean connect(String quorum, String znode) {
        connected = quorum != null && znode != null;
        return connected;
    }

    public static void disconnect() {
        connected = false;
    }

    public static String listTables() {
        if (!connected) {
            throw new IllegalStateException("not connected");
        }
        return "[\"events\",\"users\"]";
    }

    public static String getTableData(String table, String startRow, String endRow, int limit, String prefix) {
        if ("boom".equals(table)) {
            throw new IllegalStateException("scan failed: " + table);
        }
        return "[{\"row\":\"" + table + "\",\"families\":{\"args\":{"
            + "\"start\":\"" + startRow + "\","
            + "\"end\":\"" + endRow + "\","
            + "\"limit\":\"" + limit + "\","
            + "\"prefix\":\"" + prefix + "\"}}}]";
    }
}
"#;

struct Fixture {
    bridge: Bridge<JvmLauncher>,
    _dir: tempfile::TempDir,
}

static FIXTURE: Lazy<Option<Fixture>> = Lazy::new(build_fixture);
static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn jdk_tool(home: &Path, name: &str) -> PathBuf {
    home.join("bin")
        .join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
}

fn run(command: &mut Command) {
    let status = command.status().unwrap();
    assert!(status.success(), "{command:?} failed: {status}");
}

fn build_fixture() -> Option<Fixture> {
    let home = std::env::var_os("JAVA_HOME").map(PathBuf::from)?;
    if !jdk_tool(&home, "javac").is_file() {
        eprintln!("JAVA_HOME is not a JDK, skipping JVM tests");
        return None;
    }

    let dir = tempfile::tempdir().unwrap();
    let sources = dir.path().join("src/com/hbasegui/bridge");
    fs::create_dir_all(&sources).unwrap();
    let source = sources.join("HBaseBridge.java");
    fs::write(&source, STUB).unwrap();

    let classes = dir.path().join("classes");
    run(Command::new(jdk_tool(&home, "javac"))
        .arg("-d")
        .arg(&classes)
        .arg(&source));
    let jar = dir.path().join(ARCHIVE_NAME);
    run(Command::new(jdk_tool(&home, "jar"))
        .arg("cf")
        .arg(&jar)
        .arg("-C")
        .arg(&classes)
        .arg("."));

    let config = BridgeConfig {
        archive_candidates: vec![jar],
        identity: "hbase-test".into(),
        max_heap: "64m".into(),
        ..BridgeConfig::default()
    };
    Some(Fixture {
        bridge: Bridge::new(JvmLauncher, config),
        _dir: dir,
    })
}

fn with_bridge(test: impl FnOnce(&Bridge<JvmLauncher>)) {
    let Some(fixture) = FIXTURE.as_ref() else {
        return;
    };
    let _serial = SERIAL.lock();
    fixture.bridge.connect("zk1:2181", "/hbase").unwrap();
    test(&fixture.bridge);
}

#[test]
fn lists_tables() {
    with_bridge(|bridge| {
        assert_eq!(bridge.table_names().unwrap(), vec!["events", "users"]);
    });
}

#[test]
fn absent_optionals_reach_java_as_null() {
    with_bridge(|bridge| {
        let rows = bridge
            .scan_rows(&ScanRequest::new("users", 5).prefix("u"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.row, "users");
        assert_eq!(row.cell("args", "start"), Some("null"));
        assert_eq!(row.cell("args", "end"), Some("null"));
        assert_eq!(row.cell("args", "limit"), Some("5"));
        assert_eq!(row.cell("args", "prefix"), Some("u"));
    });
}

#[test]
fn thrown_exception_is_reported_and_cleared() {
    with_bridge(|bridge| {
        let err = bridge
            .get_table_data(&ScanRequest::new("boom", 10))
            .unwrap_err();
        match &err {
            BridgeError::ManagedException { description, .. } => {
                assert!(description.contains("scan failed: boom"), "{description}")
            }
            other => panic!("unexpected: {other}"),
        }
        assert_eq!(err.kind(), ErrorKind::Invocation);
        // A still-pending exception would fail the next call.
        assert!(bridge.list_tables().is_ok());
    });
}

#[test]
fn missing_method_is_unresolved() {
    with_bridge(|bridge| {
        let err = bridge
            .execute_command(&CommandRequest::get("users", "u1"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Unresolved { .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::Init);
        assert!(bridge.list_tables().is_ok());
    });
}

#[cfg(target_os = "linux")]
fn resident_kb() -> u64 {
    let statm = fs::read_to_string("/proc/self/statm").unwrap();
    let pages: u64 = statm.split_whitespace().nth(1).unwrap().parse().unwrap();
    pages * 4
}

/// A leaked local reference per call grows the permanently attached thread's
/// reference table by tens of megabytes over this many calls.
#[cfg(target_os = "linux")]
#[test]
fn repeated_string_calls_do_not_grow_memory() {
    with_bridge(|bridge| {
        for _ in 0..200_000 {
            bridge.list_tables().unwrap();
        }
        let before = resident_kb();
        for _ in 0..1_000_000 {
            bridge.list_tables().unwrap();
        }
        let grown = resident_kb().saturating_sub(before);
        assert!(grown < 8 * 1024, "resident set grew by {grown} KB");
    });
}
