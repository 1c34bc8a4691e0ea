use super::{book, opt_param, param, required_str, respond, respond_synced, scope};
use crate::grades::GradeUpdate;
use crate::ipc::types::{AppState, Request};
use crate::model::{Activity, Bimester, SchoolClass};
use serde_json::json;

fn handle_update_activity(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let bimester: Bimester = match param(req, "bimester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let activity: Activity = match param(req, "activity") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "student", book.update_activity_grade(&id, bimester, activity))
}

fn handle_bulk_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let updates: Vec<GradeUpdate> = match param(req, "updates") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.bulk_update_grades(&updates))
}

fn handle_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let bimester: Bimester = match param(req, "bimester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.bimester_average(&id, bimester))
}

fn handle_bulletin(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.bulletin(&id))
}

fn handle_class_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let class: Option<SchoolClass> = match opt_param(req, "schoolClass") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let bimester: Bimester = match param(req, "bimester") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.class_stats(class, bimester))
}

fn handle_ranks(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.class_ranks(class, bimester).map(|r| json!({ "ranks": r })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.updateActivity" => Some(handle_update_activity(state, req)),
        "grades.bulkUpdate" => Some(handle_bulk_update(state, req)),
        "grades.average" => Some(handle_average(state, req)),
        "grades.bulletin" => Some(handle_bulletin(state, req)),
        "grades.classStats" => Some(handle_class_stats(state, req)),
        "grades.ranks" => Some(handle_ranks(state, req)),
        _ => None,
    }
}
