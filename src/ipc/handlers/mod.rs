pub mod backup;
pub mod configs;
pub mod content;
pub mod core;
pub mod forum;
pub mod grades;
pub mod import;
pub mod notifications;
pub mod session;
pub mod students;
pub mod sync;

use crate::error::Result as BookResult;
use crate::gradebook::{Gradebook, Synced};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Bimester, SchoolClass};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

pub(crate) fn book<'a>(state: &'a AppState, req: &Request) -> Result<&'a Gradebook, Value> {
    state
        .book
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub(crate) fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Typed param; missing or malformed values are `bad_params`.
pub(crate) fn param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, Value> {
    let Some(raw) = req.params.get(key).filter(|v| !v.is_null()) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid {}: {}", key, e), None))
}

pub(crate) fn opt_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Option<T>, Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(_) => param(req, key).map(Some),
    }
}

/// Deserializes the whole params object.
pub(crate) fn params_as<T: DeserializeOwned>(req: &Request) -> Result<T, Value> {
    let raw = if req.params.is_null() {
        json!({})
    } else {
        req.params.clone()
    };
    serde_json::from_value(raw)
        .map_err(|e| err(&req.id, "bad_params", format!("invalid params: {}", e), None))
}

pub(crate) fn scope(req: &Request) -> Result<(SchoolClass, Bimester), Value> {
    Ok((param(req, "schoolClass")?, param(req, "bimester")?))
}

pub(crate) fn respond<T: Serialize>(req: &Request, result: BookResult<T>) -> Value {
    match result {
        Ok(v) => match serde_json::to_value(v) {
            Ok(value) => ok(&req.id, value),
            Err(e) => err(&req.id, "bad_json", e.to_string(), None),
        },
        Err(e) => domain_err(&req.id, &e),
    }
}

/// `{ <key>: value, push: outcome }`
pub(crate) fn respond_synced<T: Serialize>(req: &Request, key: &str, result: BookResult<Synced<T>>) -> Value {
    respond(
        req,
        result.map(|s| {
            let mut out = json!({ "push": s.push });
            out[key] = serde_json::to_value(s.value).unwrap_or(Value::Null);
            out
        }),
    )
}
