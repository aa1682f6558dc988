use crate::bootstrap;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::identity;
use crate::ipc::error::{fail, ok};
use crate::ipc::helpers::{required_str, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (or creates) the workspace database and seeds the first
/// management account when configured.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<bool> {
    let conn = db::open_db(path)?;
    let seeded = match state.admin_seed.as_ref() {
        Some(seed) => match bootstrap::ensure_admin(&conn, seed) {
            Ok(seeded) => seeded,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "admin bootstrap failed");
                false
            }
        },
        None => false,
    };
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(workspace = %path.display(), seeded, "workspace opened");
    Ok(seeded)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(&req.params, "path") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return fail(&req.id, &e),
    };

    match open_workspace(state, &path) {
        Ok(seeded) => ok(
            &req.id,
            json!({ "workspacePath": path.to_string_lossy(), "adminSeeded": seeded }),
        ),
        Err(e) => {
            tracing::warn!(
                workspace = %path.display(),
                error = %format!("{e:#}"),
                "workspace open failed"
            );
            fail(&req.id, &AppError::Unavailable(format!("{e:#}")))
        }
    }
}

fn handle_workspace_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was_open = state.db.take().is_some();
    if let Some(path) = state.workspace.take() {
        tracing::info!(workspace = %path.display(), "workspace closed");
    }
    ok(&req.id, json!({ "closed": was_open }))
}

fn login(state: &AppState, req: &Request) -> AppResult<serde_json::Value> {
    let conn = state.connection()?;
    let domain_id = required_str(&req.params, "domainId")?;
    let password = required_str(&req.params, "password")?;
    let actor = identity::login(conn, &domain_id, &password)?;
    Ok(json!({
        "accountId": actor.account_id,
        "role": actor.role,
        "profileId": actor.profile_id,
    }))
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, login(state, req))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.close" => Some(handle_workspace_close(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        _ => None,
    }
}
