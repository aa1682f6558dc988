use crate::courses::{self, CoursePatch, NewCourse};
use crate::enrollment;
use crate::ipc::helpers::{optional_str, patch_str, required_str, respond, with_actor};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_list(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, _actor| {
            Ok(json!({ "courses": courses::list_courses(conn)? }))
        }),
    )
}

fn handle_get(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, _actor| {
            let course_id = required_str(&req.params, "courseId")?;
            courses::get_course(conn, &course_id)
        }),
    )
}

fn handle_create(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let new = NewCourse {
                code: required_str(p, "code")?,
                name: required_str(p, "name")?,
                schedule: optional_str(p, "schedule")?,
                teacher_id: optional_str(p, "teacherId")?,
            };
            courses::create_course(conn, actor, &new)
        }),
    )
}

fn handle_update(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let course_id = required_str(p, "courseId")?;
            let patch = CoursePatch {
                code: optional_str(p, "code")?,
                name: optional_str(p, "name")?,
                schedule: patch_str(p, "schedule")?,
                teacher_id: patch_str(p, "teacherId")?,
            };
            courses::update_course(conn, actor, &course_id, &patch)
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let course_id = required_str(&req.params, "courseId")?;
            courses::delete_course(conn, actor, &course_id)?;
            Ok(json!({ "ok": true }))
        }),
    )
}

fn handle_teaching(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            Ok(json!({ "courses": courses::teaching_courses(conn, actor)? }))
        }),
    )
}

fn handle_mine(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            Ok(json!({ "courses": enrollment::my_courses(conn, actor)? }))
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_list(state, req)),
        "courses.get" => Some(handle_get(state, req)),
        "courses.create" => Some(handle_create(state, req)),
        "courses.update" => Some(handle_update(state, req)),
        "courses.delete" => Some(handle_delete(state, req)),
        "courses.teaching" => Some(handle_teaching(state, req)),
        "courses.mine" => Some(handle_mine(state, req)),
        _ => None,
    }
}
