use super::handlers;
use super::types::{AppState, Request};
use crate::error::AppError;
use crate::ipc::error::fail;

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

/// Handler families in dispatch order; the first that claims the method answers.
const FAMILIES: &[Handler] = &[
    handlers::core::try_handle,
    handlers::accounts::try_handle,
    handlers::courses::try_handle,
    handlers::enrollment::try_handle,
    handlers::assessments::try_handle,
    handlers::submissions::try_handle,
    handlers::grades::try_handle,
    handlers::attendance::try_handle,
    handlers::fees::try_handle,
    handlers::notices::try_handle,
    handlers::reports::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "dispatch");
    for family in FAMILIES {
        if let Some(resp) = family(state, &req) {
            return resp;
        }
    }

    tracing::warn!(method = %req.method, "unknown method");
    fail(
        &req.id,
        &AppError::Unimplemented(format!("method {}", req.method)),
    )
}
