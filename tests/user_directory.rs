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
) -> (String, String) {
    let value = request(stdin, reader, id, method, params);
    assert!(
        !value.get("ok").and_then(|v| v.as_bool()).unwrap_or(true),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().unwrap_or_else(|| json!({}));
    (
        error
            .get("code")
            .and_then(|v| v.as_str())
            .expect("error code")
            .to_string(),
        error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    )
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    email: &str,
    full_name: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "users.create",
        json!({
            "email": email,
            "password": "secret7",
            "role": "student",
            "profile": {
                "fullName": full_name,
                "studentId": "S-100",
                "department": "Informatique",
                "field": "CS101",
                "year": "2ème Année",
                "phoneNumber": "0611111111"
            }
        }),
    );
}

fn create_teacher(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    email: &str,
    full_name: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "users.create",
        json!({
            "email": email,
            "password": "secret7",
            "role": "teacher",
            "profile": {
                "fullName": full_name,
                "employeeId": "EMP-1",
                "department": "Informatique",
                "phoneNumber": "0600000000"
            }
        }),
    );
}

#[test]
fn resolver_finds_each_role_and_reports_misses() {
    let workspace = temp_dir("attendanced-resolve");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    create_student(&mut stdin, &mut reader, "2", "s@x.com", "Yassine Kaddour");
    create_teacher(&mut stdin, &mut reader, "3", "t@x.com", "Nadia Bensalem");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "users.create",
        json!({
            "email": "a@x.com",
            "password": "secret7",
            "role": "admin",
            "profile": {
                "fullName": "Rachid Alaoui",
                "department": "Scolarité"
            }
        }),
    );

    for (id, email, role) in [
        ("5", "s@x.com", "student"),
        ("6", "t@x.com", "teacher"),
        ("7", "a@x.com", "admin"),
    ] {
        let resolved = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "users.resolve",
            json!({ "email": email }),
        );
        assert_eq!(resolved.get("role").and_then(|v| v.as_str()), Some(role));
        assert_eq!(resolved.get("email").and_then(|v| v.as_str()), Some(email));
    }

    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "users.resolve",
        json!({ "email": "ghost@x.com" }),
    );
    assert_eq!(code, "not_found");
    assert_eq!(message, "user not found in any collection");
}

#[test]
fn users_list_accumulates_students_then_teachers() {
    let workspace = temp_dir("attendanced-userlist");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    create_teacher(&mut stdin, &mut reader, "2", "t@x.com", "Nadia Bensalem");
    create_student(&mut stdin, &mut reader, "3", "s2@x.com", "Zineb Amrani");
    create_student(&mut stdin, &mut reader, "4", "s1@x.com", "Yassine Kaddour");

    let listed = request_ok(&mut stdin, &mut reader, "5", "users.list", json!({}));
    assert_eq!(listed.get("skipped").and_then(|v| v.as_u64()), Some(0));
    let users = listed
        .get("users")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("users array");
    let roles: Vec<&str> = users
        .iter()
        .filter_map(|u| u.get("role").and_then(|v| v.as_str()))
        .collect();
    // All students first, then all teachers; names sorted inside each group.
    assert_eq!(roles, vec!["student", "student", "teacher"]);
    let names: Vec<&str> = users
        .iter()
        .filter_map(|u| u.get("fullName").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, vec!["Yassine Kaddour", "Zineb Amrani", "Nadia Bensalem"]);
}

#[test]
fn account_management_lifecycle() {
    let workspace = temp_dir("attendanced-accounts");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    create_student(&mut stdin, &mut reader, "2", "s@x.com", "Yassine Kaddour");

    // The email is taken by the auth account now.
    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "users.create",
        json!({
            "email": "s@x.com",
            "password": "secret7",
            "role": "student",
            "profile": {
                "fullName": "Someone Else",
                "studentId": "S-200",
                "department": "Informatique",
                "field": "CS101",
                "year": "1ère Année",
                "phoneNumber": "0622222222"
            }
        }),
    );
    assert_eq!(code, "auth_failed");
    assert!(message.contains("already in use"), "message: {}", message);

    // An incomplete profile is rejected before the account is created.
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "users.create",
        json!({
            "email": "half@x.com",
            "password": "secret7",
            "role": "teacher",
            "profile": { "fullName": "No Department" }
        }),
    );
    assert_eq!(code, "bad_params");
    // ...so the email is still free for a complete retry.
    create_teacher(&mut stdin, &mut reader, "5", "half@x.com", "Now Complete");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "users.setActive",
        json!({ "email": "s@x.com", "role": "student", "active": false }),
    );
    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "users.resolve",
        json!({ "email": "s@x.com" }),
    );
    assert_eq!(resolved.get("isActive").and_then(|v| v.as_bool()), Some(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "users.update",
        json!({
            "role": "student",
            "profile": {
                "email": "s@x.com",
                "fullName": "Yassine K.",
                "studentId": "S-100",
                "department": "Mathématiques",
                "field": "CS101",
                "year": "3ème Année",
                "phoneNumber": "0611111111"
            }
        }),
    );
    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "users.resolve",
        json!({ "email": "s@x.com" }),
    );
    assert_eq!(
        resolved.get("department").and_then(|v| v.as_str()),
        Some("Mathématiques")
    );
    assert_eq!(resolved.get("year").and_then(|v| v.as_str()), Some("3ème Année"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "users.delete",
        json!({ "email": "s@x.com", "role": "student" }),
    );
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "users.resolve",
        json!({ "email": "s@x.com" }),
    );
    assert_eq!(code, "not_found");

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "12",
        "users.delete",
        json!({ "email": "s@x.com", "role": "student" }),
    );
    assert_eq!(code, "not_found");
}
