use crate::attendance::{self, AttendanceMark, AttendanceStatus};
use crate::error::{AppError, AppResult};
use crate::ipc::handlers::enrollment::student_param;
use crate::ipc::helpers::{
    optional_date, required_array, required_date, required_str, respond, with_actor,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn parse_mark(r: &Value) -> AppResult<AttendanceMark> {
    let raw = required_str(r, "status")?;
    Ok(AttendanceMark {
        student_id: required_str(r, "studentId")?,
        status: AttendanceStatus::parse(&raw)
            .ok_or_else(|| AppError::validation("status must be present or absent"))?,
    })
}

fn handle_mark(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let course_id = required_str(p, "courseId")?;
            let date = required_date(p, "date")?;
            let records = required_array(p, "records")?
                .iter()
                .enumerate()
                .map(|(i, r)| parse_mark(r).map_err(|e| e.prefixed(&format!("record {i}"))))
                .collect::<AppResult<Vec<_>>>()?;
            let marked = attendance::mark(conn, actor, &course_id, date, &records)?;
            Ok(json!({ "marked": marked }))
        }),
    )
}

fn handle_summary(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            attendance::summary(conn, actor, &student_id)
        }),
    )
}

fn handle_course(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = required_str(&req.params, "courseId")?;
            let date = optional_date(&req.params, "date")?;
            Ok(json!({ "records": attendance::course_attendance(conn, actor, &course_id, date)? }))
        }),
    )
}

fn handle_student(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            attendance::student_attendance(conn, actor, &student_id)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(handle_mark(state, req)),
        "attendance.summary" => Some(handle_summary(state, req)),
        "attendance.course" => Some(handle_course(state, req)),
        "attendance.student" => Some(handle_student(state, req)),
        _ => None,
    }
}
