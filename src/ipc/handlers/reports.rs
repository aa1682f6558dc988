use crate::ipc::helpers::{respond, with_actor};
use crate::ipc::types::{AppState, Request};
use crate::reports;
use serde_json::{json, Value};

fn handle_dashboard(state: &mut AppState, req: &Request) -> Value {
    respond(req, with_actor(state, req, reports::dashboard))
}

fn handle_enrollment(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            Ok(json!({ "courses": reports::enrollment(conn, actor)? }))
        }),
    )
}

fn handle_attendance(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            Ok(json!({ "courses": reports::attendance(conn, actor)? }))
        }),
    )
}

fn handle_fees(state: &mut AppState, req: &Request) -> Value {
    respond(req, with_actor(state, req, reports::fees))
}

fn handle_grades(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            Ok(json!({ "courses": reports::grades(conn, actor)? }))
        }),
    )
}

fn handle_departments(state: &mut AppState, req: &Request) -> Value {
    respond(req, with_actor(state, req, reports::departments))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.dashboard" => Some(handle_dashboard(state, req)),
        "reports.enrollment" => Some(handle_enrollment(state, req)),
        "reports.attendance" => Some(handle_attendance(state, req)),
        "reports.fees" => Some(handle_fees(state, req)),
        "reports.grades" => Some(handle_grades(state, req)),
        "reports.departments" => Some(handle_departments(state, req)),
        _ => None,
    }
}
