use super::{book, param, respond, respond_synced, scope};
use crate::ipc::types::{AppState, Request};
use crate::model::ClassContent;

fn handle_content_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.class_content(class, bimester))
}

fn handle_content_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let content: ClassContent = match param(req, "content") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "content", book.save_class_content(content))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "content.get" => Some(handle_content_get(state, req)),
        "content.save" => Some(handle_content_save(state, req)),
        _ => None,
    }
}
