use super::{book, opt_param, param, required_str, respond, respond_synced};
use crate::ipc::types::{AppState, Request};
use crate::model::SchoolClass;
use crate::roster::{NewMaterial, NewStudent, StudentPatch};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let class: Option<SchoolClass> = match opt_param(req, "schoolClass") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let students = match class {
        Some(c) => book.store().students_in_class(c),
        None => book.store().students(),
    };
    respond(req, students.map(|list| json!({ "students": list })))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.student_or_not_found(&id).map(|s| json!({ "student": s })))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let new: NewStudent = match param(req, "student") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "student", book.create_student(new))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: StudentPatch = match param(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "student", book.update_student(&id, patch))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(
        req,
        book.delete_student(&id)
            .map(|s| json!({ "ok": true, "push": s.push })),
    )
}

fn handle_students_shift_level(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let delta: i64 = match param(req, "delta") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "student", book.shift_level(&id, delta))
}

fn handle_reminders_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let text = match required_str(req, "text") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let date: Option<String> = match opt_param(req, "date") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "reminder", book.add_personal_reminder(&id, &text, date))
}

fn handle_reminders_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let reminder_id = match required_str(req, "reminderId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "removed", book.remove_personal_reminder(&id, &reminder_id))
}

fn handle_materials_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let material: NewMaterial = match param(req, "material") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "material", book.add_personal_material(&id, material))
}

fn handle_materials_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let material_id = match required_str(req, "materialId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "removed", book.remove_personal_material(&id, &material_id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.shiftLevel" => Some(handle_students_shift_level(state, req)),
        "students.reminders.add" => Some(handle_reminders_add(state, req)),
        "students.reminders.remove" => Some(handle_reminders_remove(state, req)),
        "students.materials.add" => Some(handle_materials_add(state, req)),
        "students.materials.remove" => Some(handle_materials_remove(state, req)),
        _ => None,
    }
}
