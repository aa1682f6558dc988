#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ADMIN_DOMAIN_ID: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-secret";

pub fn temp_dir(prefix: &str) -> PathBuf {
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

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .env_remove("CAMPUSD_WORKSPACE")
        .env_remove("RUST_LOG")
        .env("CAMPUSD_ADMIN_DOMAIN_ID", ADMIN_DOMAIN_ID)
        .env("CAMPUSD_ADMIN_PASSWORD", ADMIN_PASSWORD)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn read_response(reader: &mut BufReader<ChildStdout>) -> Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    actor: Option<&str>,
    method: &str,
    params: Value,
) -> Value {
    let mut payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if let Some(a) = actor {
        payload["actor"] = json!(a);
    }
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_response(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    actor: Option<&str>,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, actor, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

/// Returns the error code of a call that is expected to fail.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    actor: Option<&str>,
    method: &str,
    params: Value,
) -> String {
    let value = request(stdin, reader, id, actor, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error.code")
        .to_string()
}

pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {key} in {v}"))
        .to_string()
}

/// Opens a fresh workspace and logs in as the seeded management account.
pub fn open_as_admin(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> (PathBuf, String) {
    let workspace = temp_dir(prefix);
    let opened = request_ok(
        stdin,
        reader,
        "open",
        None,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        opened.get("adminSeeded").and_then(|v| v.as_bool()),
        Some(true)
    );
    let login = request_ok(
        stdin,
        reader,
        "login",
        None,
        "auth.login",
        json!({ "domainId": ADMIN_DOMAIN_ID, "password": ADMIN_PASSWORD }),
    );
    (workspace, str_field(&login, "accountId"))
}

/// Creates an account and returns (accountId, profileId).
pub fn create_account(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    admin: &str,
    role: &str,
    domain_id: &str,
    name: &str,
) -> (String, String) {
    let created = request_ok(
        stdin,
        reader,
        &format!("create-{domain_id}"),
        Some(admin),
        "accounts.create",
        json!({
            "role": role,
            "domainId": domain_id,
            "password": "password1",
            "name": name,
        }),
    );
    (str_field(&created, "accountId"), str_field(&created, "profileId"))
}
