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

#[test]
fn sign_in_round_trip() {
    let workspace = temp_dir("attendanced-auth");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    // Everything needs a workspace first.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "0",
        "auth.signIn",
        json!({ "email": "t@x.com", "password": "secret7" }),
    );
    assert_eq!(code, "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "auth.createAccount",
        json!({ "email": "t@x.com", "password": "short" }),
    );
    assert_eq!(code, "auth_failed");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.create",
        json!({
            "email": "t@x.com",
            "password": "secret7",
            "role": "teacher",
            "profile": {
                "fullName": "Nadia Bensalem",
                "employeeId": "EMP-77",
                "department": "Informatique",
                "phoneNumber": "0600000000"
            }
        }),
    );

    let current = request_ok(&mut stdin, &mut reader, "4", "auth.currentUser", json!({}));
    assert!(current.get("email").map(|v| v.is_null()).unwrap_or(false));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "auth.signIn",
        json!({ "email": "t@x.com", "password": "wrong-password" }),
    );
    assert_eq!(code, "auth_failed");

    let signed_in = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "auth.signIn",
        json!({ "email": "t@x.com", "password": "secret7" }),
    );
    assert_eq!(signed_in.get("email").and_then(|v| v.as_str()), Some("t@x.com"));

    let current = request_ok(&mut stdin, &mut reader, "7", "auth.currentUser", json!({}));
    assert_eq!(current.get("email").and_then(|v| v.as_str()), Some("t@x.com"));

    // Sign-in stamps the teacher's lastLoginAt.
    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "users.resolve",
        json!({ "email": "t@x.com" }),
    );
    assert!(resolved
        .get("lastLoginAt")
        .and_then(|v| v.as_str())
        .is_some());

    let _ = request_ok(&mut stdin, &mut reader, "9", "auth.signOut", json!({}));
    let current = request_ok(&mut stdin, &mut reader, "10", "auth.currentUser", json!({}));
    assert!(current.get("email").map(|v| v.is_null()).unwrap_or(false));
}
