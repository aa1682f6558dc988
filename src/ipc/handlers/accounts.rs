use crate::error::AppError;
use crate::identity::{self, NewAccount, ProfilePatch, Role};
use crate::ipc::helpers::{optional_str, required_str, respond, with_actor};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

/// `rollNumber`, `department` or `phoneNumber`, whichever the role uses.
fn extra_field(params: &Value, role: Role) -> Result<Option<String>, AppError> {
    let key = match role {
        Role::Student => "rollNumber",
        Role::Teacher => "department",
        Role::Management => "phoneNumber",
    };
    optional_str(params, key)
}

fn profile_patch(params: &Value, role: Role) -> Result<ProfilePatch, AppError> {
    Ok(ProfilePatch {
        name: optional_str(params, "name")?,
        email: optional_str(params, "email")?,
        extra: extra_field(params, role)?,
    })
}

fn handle_create(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let role_raw = required_str(p, "role")?;
            let role = Role::parse(&role_raw).ok_or_else(|| {
                AppError::validation("role must be student, teacher or management")
            })?;
            let new = NewAccount {
                role: Some(role),
                domain_id: required_str(p, "domainId")?,
                password: required_str(p, "password")?,
                name: required_str(p, "name")?,
                email: optional_str(p, "email")?,
                extra: extra_field(p, role)?,
            };
            identity::create_account(conn, actor, &new)
        }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let users = identity::list_users(conn, actor)?;
            Ok(json!({ "users": users }))
        }),
    )
}

fn handle_update(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            actor.require(&[Role::Management])?;
            let account_id = required_str(&req.params, "accountId")?;
            let target = identity::get_profile(conn, &account_id)?;
            let patch = profile_patch(&req.params, target.role)?;
            identity::update_user(conn, actor, &account_id, &patch)
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let account_id = required_str(&req.params, "accountId")?;
            identity::delete_user(conn, actor, &account_id)?;
            Ok(json!({ "ok": true }))
        }),
    )
}

fn handle_profile_get(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            identity::get_profile(conn, &actor.account_id)
        }),
    )
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let patch = profile_patch(&req.params, actor.role)?;
            identity::update_profile(conn, actor, &patch)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "accounts.create" => Some(handle_create(state, req)),
        "accounts.list" => Some(handle_list(state, req)),
        "accounts.update" => Some(handle_update(state, req)),
        "accounts.delete" => Some(handle_delete(state, req)),
        "profile.get" => Some(handle_profile_get(state, req)),
        "profile.update" => Some(handle_profile_update(state, req)),
        _ => None,
    }
}
