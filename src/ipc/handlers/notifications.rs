use super::{book, param, params_as, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::notify::{NewNotification, NotificationFilter};
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let filter: NotificationFilter = match params_as(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(
        req,
        book.notifications(&filter)
            .map(|list| json!({ "notifications": list })),
    )
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let new: NewNotification = match param(req, "notification") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // `null` when an identical notification was recorded moments ago.
    respond(
        req,
        book.post_notification(new)
            .map(|n| json!({ "notification": n })),
    )
}

fn handle_mark_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "notificationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(
        req,
        book.mark_notification_read(&student_id, &id)
            .map(|changed| json!({ "changed": changed })),
    )
}

fn handle_mark_all_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(
        req,
        book.mark_all_notifications_read(&student_id)
            .map(|n| json!({ "marked": n })),
    )
}

fn handle_remove_by_ref(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let ref_id = match required_str(req, "refId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(
        req,
        book.retract_notifications(&ref_id)
            .map(|n| json!({ "removed": n })),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.list" => Some(handle_list(state, req)),
        "notifications.add" => Some(handle_add(state, req)),
        "notifications.markRead" => Some(handle_mark_read(state, req)),
        "notifications.markAllRead" => Some(handle_mark_all_read(state, req)),
        "notifications.removeByRef" => Some(handle_remove_by_ref(state, req)),
        _ => None,
    }
}
