use super::{book, param, respond, respond_synced, scope};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassActivityConfig, ClassSettings};
use serde_json::json;

fn handle_configs_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(
        req,
        book.activity_configs(class, bimester)
            .map(|c| json!({ "configs": c })),
    )
}

fn handle_configs_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let configs: Vec<ClassActivityConfig> = match param(req, "configs") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "summary", book.save_activity_configs(class, bimester, &configs))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.class_settings(class, bimester))
}

fn handle_settings_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings: ClassSettings = match param(req, "settings") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "settings", book.save_class_settings(class, bimester, settings))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "configs.get" => Some(handle_configs_get(state, req)),
        "configs.save" => Some(handle_configs_save(state, req)),
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.save" => Some(handle_settings_save(state, req)),
        _ => None,
    }
}
