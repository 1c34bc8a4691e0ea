use super::{book, param, required_str, respond, respond_synced};
use crate::ipc::types::{AppState, Request};
use crate::model::{MonitorPermissions, UserRole};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role: UserRole = match param(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.login(&email, &password, role))
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    respond(req, book.logout().map(|_| json!({ "ok": true })))
}

fn handle_session_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    respond(req, book.session().map(|s| json!({ "session": s })))
}

fn handle_teachers_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "teacher", book.register_teacher(&name, &email, &password))
}

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    respond(req, book.teachers().map(|list| json!({ "teachers": list })))
}

fn handle_permissions_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    respond(req, book.monitor_permissions())
}

fn handle_permissions_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let permissions: MonitorPermissions = match param(req, "permissions") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.update_monitor_permissions(permissions))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.login" => Some(handle_login(state, req)),
        "session.logout" => Some(handle_logout(state, req)),
        "session.get" => Some(handle_session_get(state, req)),
        "teachers.register" => Some(handle_teachers_register(state, req)),
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "permissions.get" => Some(handle_permissions_get(state, req)),
        "permissions.update" => Some(handle_permissions_update(state, req)),
        _ => None,
    }
}
