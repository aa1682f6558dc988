use crate::error::{AppError, AppResult};
use crate::enrollment::{self, EnrollmentStatus};
use crate::identity::{Actor, Role};
use crate::ipc::helpers::{optional_str, required_str, respond, with_actor};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

/// Students default to themselves; everyone else must name the student.
pub(crate) fn student_param(params: &Value, actor: &Actor) -> AppResult<String> {
    match optional_str(params, "studentId")? {
        Some(id) => Ok(id),
        None if actor.is(Role::Student) => Ok(actor.profile_id.clone()),
        None => Err(AppError::validation("missing params.studentId")),
    }
}

fn handle_enroll(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            let course_id = required_str(&req.params, "courseId")?;
            enrollment::enroll(conn, actor, &student_id, &course_id)
        }),
    )
}

fn handle_list_enrolled(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = required_str(&req.params, "courseId")?;
            Ok(json!({ "students": enrollment::list_enrolled(conn, actor, &course_id)? }))
        }),
    )
}

fn handle_list_available(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            Ok(json!({ "courses": enrollment::list_available(conn, actor, &student_id)? }))
        }),
    )
}

fn handle_unenroll(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = required_str(&req.params, "studentId")?;
            let course_id = required_str(&req.params, "courseId")?;
            enrollment::unenroll(conn, actor, &student_id, &course_id)?;
            Ok(json!({ "ok": true }))
        }),
    )
}

fn handle_set_status(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = required_str(&req.params, "studentId")?;
            let course_id = required_str(&req.params, "courseId")?;
            let raw = required_str(&req.params, "status")?;
            let status = EnrollmentStatus::parse(&raw).ok_or_else(|| {
                AppError::validation("status must be registered, dropped or completed")
            })?;
            enrollment::set_status(conn, actor, &student_id, &course_id, status)?;
            Ok(json!({ "ok": true, "status": status }))
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "enrollment.enroll" => Some(handle_enroll(state, req)),
        "enrollment.listEnrolled" => Some(handle_list_enrolled(state, req)),
        "enrollment.listAvailable" => Some(handle_list_available(state, req)),
        "enrollment.unenroll" => Some(handle_unenroll(state, req)),
        "enrollment.setStatus" => Some(handle_set_status(state, req)),
        _ => None,
    }
}
