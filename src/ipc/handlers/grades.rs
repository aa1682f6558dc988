use crate::calc::{self, ScoreWrite};
use crate::error::AppResult;
use crate::ipc::handlers::enrollment::student_param;
use crate::ipc::helpers::{
    optional_i64, optional_str, required_array, required_f64, required_str, respond, with_actor,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn parse_score_write(p: &Value) -> AppResult<ScoreWrite> {
    Ok(ScoreWrite {
        student_id: required_str(p, "studentId")?,
        component_id: required_str(p, "componentId")?,
        score: required_f64(p, "score")?,
        feedback: optional_str(p, "feedback")?,
        expected_version: optional_i64(p, "expectedVersion")?,
    })
}

fn handle_sheet(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = required_str(&req.params, "courseId")?;
            calc::grade_sheet(conn, actor, &course_id)
        }),
    )
}

fn handle_record(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let write = parse_score_write(&req.params)?;
            calc::record_score(conn, actor, &write)
        }),
    )
}

fn handle_bulk_record(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = required_str(&req.params, "courseId")?;
            let entries = required_array(&req.params, "entries")?
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    parse_score_write(e).map_err(|err| err.prefixed(&format!("entry {i}")))
                })
                .collect::<AppResult<Vec<_>>>()?;
            let updated = calc::bulk_record_scores(conn, actor, &course_id, &entries)?;
            Ok(json!({ "updated": updated }))
        }),
    )
}

fn handle_student(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            Ok(json!({ "courses": calc::student_grades(conn, actor, &student_id)? }))
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "grades.sheet" => Some(handle_sheet(state, req)),
        "grades.record" => Some(handle_record(state, req)),
        "grades.bulkRecord" => Some(handle_bulk_record(state, req)),
        "grades.student" => Some(handle_student(state, req)),
        _ => None,
    }
}
