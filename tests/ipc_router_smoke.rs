use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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

fn spawn_sidecar(cwd: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_simbiod");
    let mut child = Command::new(exe)
        .current_dir(cwd)
        .env_remove("SIMBIO_REMOTE_URL")
        .env_remove("SIMBIO_REMOTE_KEY")
        .env_remove("SIMBIO_WORKSPACE")
        .env("SIMBIO_PASSWORD_COST", "4")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn simbiod");
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
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn requests_before_workspace_select_are_rejected() {
    let cwd = temp_dir("simbio-router-noworkspace");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&cwd);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["version"].as_str(), Some(env!("CARGO_PKG_VERSION")));
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["remoteConfigured"].as_bool(), Some(false));

    let resp = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(error_code(&resp), "no_workspace");

    let resp = request(&mut stdin, &mut reader, "3", "grades.teleport", json!({}));
    assert_eq!(error_code(&resp), "not_implemented");
    assert_eq!(
        resp["error"]["message"].as_str(),
        Some("unknown method: grades.teleport")
    );

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json line");
    let resp: serde_json::Value = serde_json::from_str(line.trim()).expect("parse bad_json");
    assert_eq!(resp["ok"].as_bool(), Some(false));
    assert_eq!(error_code(&resp), "bad_json");

    // The loop keeps serving after a malformed line. The calendar uses the UTC date.
    let before = chrono::Utc::now().date_naive().to_string();
    let calendar = request_ok(&mut stdin, &mut reader, "4", "calendar.currentBimester", json!({}));
    let after = chrono::Utc::now().date_naive().to_string();
    let today = calendar["today"].as_str().expect("today");
    assert!(today == before || today == after, "{} not a UTC date", today);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("simbio-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        selected["workspacePath"].as_str(),
        Some(workspace.to_string_lossy().as_ref())
    );

    let scope = json!({ "schoolClass": "1A", "bimester": "1º Bimestre" });
    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        ("calendar.currentBimester", json!({})),
        ("session.get", json!({})),
        ("teachers.list", json!({})),
        ("permissions.get", json!({})),
        ("students.list", json!({ "schoolClass": "1A" })),
        ("configs.get", scope.clone()),
        ("settings.get", scope.clone()),
        ("content.get", scope.clone()),
        ("forum.list", scope.clone()),
        ("forum.settings.get", scope.clone()),
        ("grades.classStats", json!({ "bimester": "1º Bimestre" })),
        ("grades.ranks", scope.clone()),
        ("notifications.list", json!({})),
        ("import.students", json!({ "csv": "" })),
        ("sync.status", json!({})),
        ("backup.export", json!({ "outPath": bundle_out.to_string_lossy() })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("s{}", i);
        let _ = request_ok(&mut stdin, &mut reader, &id, method, params);
    }
    assert!(bundle_out.is_file());

    // Without a remote the pull is refused, not unknown.
    let resp = request(&mut stdin, &mut reader, "p", "sync.pull", json!({}));
    assert_ne!(error_code(&resp), "not_implemented");
    assert_eq!(resp["ok"].as_bool(), Some(false));

    let resp = request(&mut stdin, &mut reader, "m", "students.get", json!({}));
    assert_eq!(error_code(&resp), "bad_params");
    assert_eq!(resp["error"]["message"].as_str(), Some("missing studentId"));

    drop(stdin);
    let _ = child.wait();
}
