#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn temp_workspace(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("create temp dir")
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

pub fn read_json_line(sidecar: &mut Sidecar) -> serde_json::Value {
    let mut line = String::new();
    sidecar
        .reader
        .read_line(&mut line)
        .expect("read response line");
    assert!(!line.trim().is_empty(), "sidecar closed its output");
    serde_json::from_str(line.trim()).expect("parse response json")
}

/// Sends one request and returns the raw reply envelope.
pub fn request(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(sidecar.stdin, "{}", payload).expect("write request");
    sidecar.stdin.flush().expect("flush request");

    let value = read_json_line(sidecar);
    assert_eq!(
        value.get("id").and_then(|v| v.as_str()),
        Some(id),
        "reply out of order for {}: {}",
        method,
        value
    );
    value
}

pub fn request_ok(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(sidecar, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Sends a request that must fail and returns its error code.
pub fn request_err(
    sidecar: &mut Sidecar,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> (String, serde_json::Value) {
    let value = request(sidecar, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().unwrap_or_else(|| json!({}));
    let code = error
        .get("code")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    (code, error)
}

pub fn select_workspace(sidecar: &mut Sidecar, workspace: &tempfile::TempDir) {
    let _ = request_ok(
        sidecar,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
}

pub fn assign(sidecar: &mut Sidecar, teacher_id: &str, rows: serde_json::Value) {
    let _ = request_ok(
        sidecar,
        &format!("assign-{}", teacher_id),
        "staff.assignments.replace",
        json!({ "teacherId": teacher_id, "assignments": rows }),
    );
}

pub fn slot_summaries(slots: &serde_json::Value) -> Vec<String> {
    slots
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|s| {
            format!(
                "{} {}-{}",
                s.get("subjectId").and_then(|v| v.as_str()).unwrap_or(""),
                s.get("startTime").and_then(|v| v.as_str()).unwrap_or(""),
                s.get("endTime").and_then(|v| v.as_str()).unwrap_or("")
            )
        })
        .collect()
}
