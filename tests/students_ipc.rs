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

fn new_student(name: &str, email: &str, class: &str) -> serde_json::Value {
    json!({
        "name": name,
        "email": email,
        "password": "senha123",
        "schoolClass": class,
        "birthDate": "2009-05-10",
        "biologicalSex": "F",
        "residenceType": "URBAN",
    })
}

#[test]
fn students_create_update_delete_over_ipc() {
    let workspace = temp_dir("simbio-students-ipc");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "student": new_student("Ana Souza", "ana@escola.br", "1A") }),
    );
    assert_eq!(created["push"]["status"].as_str(), Some("skipped"));
    let ana = &created["student"];
    let ana_id = ana["id"].as_str().expect("student id").to_string();
    assert_eq!(ana["biologicalLevel"].as_str(), Some("ORGANELLE"));
    assert!(ana.get("credential").is_none());
    let first = ana["bimesterGrades"]["1º Bimestre"]
        .as_array()
        .expect("first bimester");
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|a| a["score"].is_null()));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "student": new_student("Bruno Lima", "bruno@escola.br", "2B") }),
    );

    let dup = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "student": new_student("Outra Ana", "ana@escola.br", "1B") }),
    );
    assert_eq!(error_code(&dup), "duplicate_email");
    assert_eq!(dup["error"]["details"]["email"].as_str(), Some("ana@escola.br"));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.list",
        json!({ "schoolClass": "1A" }),
    );
    let rows = listed["students"].as_array().expect("students");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"].as_str(), Some("Ana Souza"));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.update",
        json!({ "studentId": ana_id, "patch": { "name": "Ana S. Souza", "isMonitor": true } }),
    );
    assert_eq!(updated["student"]["name"].as_str(), Some("Ana S. Souza"));
    assert_eq!(updated["student"]["isMonitor"].as_bool(), Some(true));

    let clash = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.update",
        json!({ "studentId": ana_id, "patch": { "email": "bruno@escola.br" } }),
    );
    assert_eq!(error_code(&clash), "duplicate_email");

    let unknown_field = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.update",
        json!({ "studentId": ana_id, "patch": { "favoriteColor": "green" } }),
    );
    assert_eq!(error_code(&unknown_field), "bad_params");

    let shifted = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.shiftLevel",
        json!({ "studentId": ana_id, "delta": 99 }),
    );
    assert_eq!(shifted["student"]["biologicalLevel"].as_str(), Some("ORGANISM"));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "students.delete",
        json!({ "studentId": ana_id }),
    );
    assert_eq!(deleted["ok"].as_bool(), Some(true));

    let missing = request(
        &mut stdin,
        &mut reader,
        "11",
        "students.get",
        json!({ "studentId": ana_id }),
    );
    assert_eq!(error_code(&missing), "not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn personal_reminders_notify_the_student() {
    let workspace = temp_dir("simbio-students-reminders");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "student": new_student("Caio", "caio@escola.br", "3A") }),
    );
    let id = created["student"]["id"].as_str().expect("id").to_string();

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.reminders.add",
        json!({ "studentId": id, "text": "Trazer o caderno", "date": "2026-03-10" }),
    );
    let reminder_id = added["reminder"]["id"].as_str().expect("reminder id").to_string();

    let notes = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "notifications.list",
        json!({ "studentId": id }),
    );
    let notes = notes["notifications"].as_array().expect("notifications");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["type"].as_str(), Some("REMINDER"));
    assert_eq!(notes[0]["message"].as_str(), Some("Aviso exclusivo enviado para você."));

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.reminders.remove",
        json!({ "studentId": id, "reminderId": reminder_id }),
    );
    assert_eq!(removed["removed"].as_bool(), Some(true));
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.reminders.remove",
        json!({ "studentId": id, "reminderId": reminder_id }),
    );
    assert_eq!(again["removed"].as_bool(), Some(false));

    drop(stdin);
    let _ = child.wait();
}
