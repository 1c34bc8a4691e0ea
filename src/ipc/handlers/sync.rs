use super::{book, respond};
use crate::ipc::types::{AppState, Request};

fn handle_pull(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    respond(req, book.pull())
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    respond(req, book.sync_status())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.pull" => Some(handle_pull(state, req)),
        "sync.status" => Some(handle_status(state, req)),
        _ => None,
    }
}
