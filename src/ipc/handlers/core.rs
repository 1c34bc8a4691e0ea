use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Bimester;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "remoteConfigured": state.config.remote.is_some(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match state.open_workspace(path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_current_bimester(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let today = Utc::now().date_naive();
    let bimester = Bimester::containing(today);
    let (start, end) = bimester.date_range();
    ok(
        &req.id,
        json!({
            "bimester": bimester,
            "today": today.to_string(),
            "start": start.to_string(),
            "end": end.to_string(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "calendar.currentBimester" => Some(handle_current_bimester(state, req)),
        _ => None,
    }
}
