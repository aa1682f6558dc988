use crate::catalog::{
    self, ComponentKind, ComponentPatch, NewComponent, NewOption, NewQuestion, NewQuiz,
};
use crate::error::{AppError, AppResult};
use crate::ipc::helpers::{
    optional_bool, optional_date, optional_f64, optional_i64, optional_str, patch_date, patch_str,
    required_array, required_f64, required_str, respond, with_actor,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_define(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let course_id = required_str(p, "courseId")?;
            let kind_raw = required_str(p, "kind")?;
            let kind = ComponentKind::parse(&kind_raw).ok_or_else(|| {
                AppError::validation("kind must be assignment, quiz or rubric_item")
            })?;
            let new = NewComponent {
                kind,
                title: required_str(p, "title")?,
                description: optional_str(p, "description")?,
                max_score: required_f64(p, "maxScore")?,
                weight: optional_f64(p, "weight")?,
                due_date: optional_date(p, "dueDate")?,
                duration_minutes: optional_i64(p, "durationMinutes")?,
            };
            catalog::define_component(conn, actor, &course_id, &new)
        }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = required_str(&req.params, "courseId")?;
            Ok(json!({ "components": catalog::list_components(conn, actor, &course_id)? }))
        }),
    )
}

fn handle_update(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let component_id = required_str(p, "componentId")?;
            let patch = ComponentPatch {
                title: optional_str(p, "title")?,
                description: patch_str(p, "description")?,
                max_score: optional_f64(p, "maxScore")?,
                weight: optional_f64(p, "weight")?,
                due_date: patch_date(p, "dueDate")?,
                duration_minutes: optional_i64(p, "durationMinutes")?,
            };
            catalog::update_component(conn, actor, &component_id, &patch)
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let component_id = required_str(&req.params, "componentId")?;
            catalog::delete_component(conn, actor, &component_id)?;
            Ok(json!({ "ok": true }))
        }),
    )
}

fn parse_option(o: &Value) -> AppResult<NewOption> {
    Ok(NewOption {
        text: required_str(o, "text")?,
        correct: optional_bool(o, "correct")?.unwrap_or(false),
    })
}

fn parse_question(q: &Value) -> AppResult<NewQuestion> {
    let options = required_array(q, "options")?
        .iter()
        .enumerate()
        .map(|(i, o)| parse_option(o).map_err(|e| e.prefixed(&format!("option {i}"))))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(NewQuestion {
        text: required_str(q, "text")?,
        points: required_f64(q, "points")?,
        options,
    })
}

fn parse_quiz(p: &Value) -> AppResult<NewQuiz> {
    let questions = required_array(p, "questions")?
        .iter()
        .enumerate()
        .map(|(i, q)| parse_question(q).map_err(|e| e.prefixed(&format!("question {i}"))))
        .collect::<AppResult<Vec<_>>>()?;
    let duration_minutes = optional_i64(p, "durationMinutes")?
        .ok_or_else(|| AppError::validation("missing params.durationMinutes"))?;
    Ok(NewQuiz {
        title: required_str(p, "title")?,
        description: optional_str(p, "description")?,
        max_score: required_f64(p, "maxScore")?,
        due_date: optional_date(p, "dueDate")?,
        duration_minutes,
        questions,
    })
}

fn handle_quiz_create(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = required_str(&req.params, "courseId")?;
            let quiz = parse_quiz(&req.params)?;
            catalog::create_quiz(conn, actor, &course_id, &quiz)
        }),
    )
}

fn handle_quiz_get(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let component_id = required_str(&req.params, "componentId")?;
            catalog::get_quiz(conn, actor, &component_id)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "assessments.define" => Some(handle_define(state, req)),
        "assessments.list" => Some(handle_list(state, req)),
        "assessments.update" => Some(handle_update(state, req)),
        "assessments.delete" => Some(handle_delete(state, req)),
        "quizzes.create" => Some(handle_quiz_create(state, req)),
        "quizzes.get" => Some(handle_quiz_get(state, req)),
        _ => None,
    }
}
