use super::{book, param, respond};
use crate::ipc::types::{AppState, Request};

fn handle_import_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    // Raw text, blank allowed; an empty paste yields an empty report.
    let csv: String = match param(req, "csv") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.import_students(&csv))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "import.students" => Some(handle_import_students(state, req)),
        _ => None,
    }
}
