use crate::error::{AppError, AppResult};
use crate::identity::{resolve_actor, Actor};
use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

fn missing(key: &str) -> AppError {
    AppError::validation(format!("missing params.{key}"))
}

fn wrong_type(key: &str, expected: &str) -> AppError {
    AppError::validation(format!("params.{key} must be {expected}"))
}

pub fn required_str(params: &Value, key: &str) -> AppResult<String> {
    optional_str(params, key)?.ok_or_else(|| missing(key))
}

/// Absent and `null` both read as `None`.
pub fn optional_str(params: &Value, key: &str) -> AppResult<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(wrong_type(key, "a string")),
    }
}

/// Absent leaves a field alone; `null` clears it.
pub fn patch_str(params: &Value, key: &str) -> AppResult<Option<Option<String>>> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(wrong_type(key, "a string or null")),
    }
}

pub fn optional_f64(params: &Value, key: &str) -> AppResult<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| wrong_type(key, "a number")),
    }
}

pub fn required_f64(params: &Value, key: &str) -> AppResult<f64> {
    optional_f64(params, key)?.ok_or_else(|| missing(key))
}

pub fn optional_i64(params: &Value, key: &str) -> AppResult<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| wrong_type(key, "an integer")),
    }
}

pub fn optional_bool(params: &Value, key: &str) -> AppResult<Option<bool>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or_else(|| wrong_type(key, "a boolean")),
    }
}

pub fn required_array<'a>(params: &'a Value, key: &str) -> AppResult<&'a Vec<Value>> {
    match params.get(key) {
        None | Some(Value::Null) => Err(missing(key)),
        Some(v) => v.as_array().ok_or_else(|| wrong_type(key, "an array")),
    }
}

pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("invalid date {raw:?}, expected YYYY-MM-DD")))
}

pub fn optional_date(params: &Value, key: &str) -> AppResult<Option<NaiveDate>> {
    optional_str(params, key)?.as_deref().map(parse_date).transpose()
}

pub fn required_date(params: &Value, key: &str) -> AppResult<NaiveDate> {
    optional_date(params, key)?.ok_or_else(|| missing(key))
}

pub fn patch_date(params: &Value, key: &str) -> AppResult<Option<Option<NaiveDate>>> {
    match patch_str(params, key)? {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(raw)) => Ok(Some(Some(parse_date(&raw)?))),
    }
}

/// Resolves the calling account before running `f`.
pub fn with_actor<T>(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &Actor) -> AppResult<T>,
) -> AppResult<T> {
    let conn = state.connection()?;
    let Some(account_id) = req.actor.as_deref() else {
        return Err(AppError::forbidden("missing actor"));
    };
    let actor = resolve_actor(conn, account_id)?;
    f(conn, &actor)
}

pub fn respond<T: Serialize>(req: &Request, result: AppResult<T>) -> Value {
    match result {
        Ok(v) => match serde_json::to_value(v) {
            Ok(json) => ok(&req.id, json),
            Err(e) => err(&req.id, "internal", e.to_string(), false, None),
        },
        Err(e) => {
            tracing::warn!(
                id = %req.id,
                method = %req.method,
                code = e.code(),
                error = %e,
                "request failed"
            );
            fail(&req.id, &e)
        }
    }
}
