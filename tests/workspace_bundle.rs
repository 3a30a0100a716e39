use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert!(
        !value.get("ok").and_then(|v| v.as_bool()).unwrap_or(true),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

fn create_field(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "fields.create",
        json!({
            "fieldName": name,
            "department": "Informatique",
            "weeklySchedule": [
                { "dayOfWeek": "Lundi", "startTime": "08:00", "endTime": "10:00", "room": "A102" }
            ]
        }),
    );
}

fn field_count(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, id: &str) -> usize {
    let listed = request_ok(stdin, reader, id, "fields.list", json!({}));
    listed
        .get("fields")
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0)
}

#[test]
fn export_then_import_restores_the_snapshot() {
    let workspace = temp_dir("attendanced-bundle");
    let bundle_path = workspace.join("out").join("snapshot.zip");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let code = request_err(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.exportBundle",
        json!({ "outPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(code, "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    create_field(&mut stdin, &mut reader, "2", "CS101");

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.exportBundle",
        json!({ "outPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("attendance-workspace-v1")
    );
    assert!(bundle_path.is_file());

    // Diverge from the snapshot, then restore it.
    create_field(&mut stdin, &mut reader, "4", "MATH201");
    assert_eq!(field_count(&mut stdin, &mut reader, "5"), 2);

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.importBundle",
        json!({ "inPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(
        imported.get("bundleFormatDetected").and_then(|v| v.as_str()),
        Some("attendance-workspace-v1")
    );
    assert_eq!(field_count(&mut stdin, &mut reader, "7"), 1);
}

#[test]
fn garbage_bundles_are_rejected_and_the_workspace_survives() {
    let workspace = temp_dir("attendanced-bundle-bad");
    let junk_path = workspace.join("junk.zip");
    std::fs::write(&junk_path, b"this is not a zip archive").expect("write junk");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    create_field(&mut stdin, &mut reader, "2", "CS101");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.importBundle",
        json!({ "inPath": junk_path.to_string_lossy() }),
    );
    assert_eq!(code, "import_failed");

    // The live database was not replaced by the failed import.
    assert_eq!(field_count(&mut stdin, &mut reader, "4"), 1);
}
