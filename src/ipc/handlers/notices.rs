use crate::ipc::helpers::{optional_str, required_str, respond, with_actor};
use crate::ipc::types::{AppState, Request};
use crate::notices;
use serde_json::{json, Value};

fn handle_post(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let title = required_str(p, "title")?;
            let content = required_str(p, "content")?;
            let course_id = optional_str(p, "courseId")?;
            notices::post(conn, actor, &title, &content, course_id.as_deref())
        }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = optional_str(&req.params, "courseId")?;
            Ok(json!({ "notices": notices::list(conn, actor, course_id.as_deref())? }))
        }),
    )
}

fn handle_update(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let notice_id = required_str(p, "noticeId")?;
            let title = optional_str(p, "title")?;
            let content = optional_str(p, "content")?;
            notices::update(
                conn,
                actor,
                &notice_id,
                title.as_deref(),
                content.as_deref(),
            )
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let notice_id = required_str(&req.params, "noticeId")?;
            notices::delete(conn, actor, &notice_id)?;
            Ok(json!({ "ok": true }))
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "notices.post" => Some(handle_post(state, req)),
        "notices.list" => Some(handle_list(state, req)),
        "notices.update" => Some(handle_update(state, req)),
        "notices.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
