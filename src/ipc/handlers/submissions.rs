use crate::ipc::handlers::enrollment::student_param;
use crate::ipc::helpers::{optional_i64, optional_str, required_str, respond, with_actor};
use crate::ipc::types::{AppState, Request};
use crate::submissions;
use serde_json::{json, Value};

const DEFAULT_RECENT_LIMIT: i64 = 10;

fn handle_submit(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            let component_id = required_str(&req.params, "componentId")?;
            let content = optional_str(&req.params, "content")?;
            submissions::submit(conn, actor, &student_id, &component_id, content.as_deref())
        }),
    )
}

fn handle_pending(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            Ok(json!({ "submissions": submissions::pending_for_teacher(conn, actor)? }))
        }),
    )
}

fn handle_recent(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let limit = optional_i64(&req.params, "limit")?.unwrap_or(DEFAULT_RECENT_LIMIT);
            Ok(json!({ "submissions": submissions::recent_for_teacher(conn, actor, limit)? }))
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "submissions.submit" => Some(handle_submit(state, req)),
        "submissions.pending" => Some(handle_pending(state, req)),
        "submissions.recent" => Some(handle_recent(state, req)),
        _ => None,
    }
}
