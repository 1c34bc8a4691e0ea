use super::{book, param, required_str, respond, respond_synced, scope};
use crate::content::NewForumPost;
use crate::ipc::types::{AppState, Request};
use crate::model::ForumSettings;
use serde_json::json;

fn handle_forum_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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
        book.forum_posts(class, bimester)
            .map(|posts| json!({ "posts": posts })),
    )
}

fn handle_forum_post(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let post: NewForumPost = match param(req, "post") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "post", book.post_to_forum(post))
}

fn handle_forum_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let id = match required_str(req, "postId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "removed", book.delete_forum_post(&id))
}

fn handle_forum_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond(req, book.forum_settings(class, bimester))
}

fn handle_forum_settings_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let book = match book(state, req) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let (class, bimester) = match scope(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings: ForumSettings = match param(req, "settings") {
        Ok(v) => v,
        Err(e) => return e,
    };
    respond_synced(req, "settings", book.save_forum_settings(class, bimester, settings))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "forum.list" => Some(handle_forum_list(state, req)),
        "forum.post" => Some(handle_forum_post(state, req)),
        "forum.delete" => Some(handle_forum_delete(state, req)),
        "forum.settings.get" => Some(handle_forum_settings_get(state, req)),
        "forum.settings.save" => Some(handle_forum_settings_save(state, req)),
        _ => None,
    }
}
