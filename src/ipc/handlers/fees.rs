use crate::error::AppError;
use crate::fees::{self, FeeStatus, NewFee};
use crate::ipc::handlers::enrollment::student_param;
use crate::ipc::helpers::{
    optional_date, optional_str, required_f64, required_str, respond, with_actor,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_record(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let p = &req.params;
            let status = match optional_str(p, "status")? {
                None => FeeStatus::Unpaid,
                Some(raw) => FeeStatus::parse(&raw).ok_or_else(|| {
                    AppError::validation("status must be unpaid, pending or paid")
                })?,
            };
            let new = NewFee {
                student_id: required_str(p, "studentId")?,
                amount: required_f64(p, "amount")?,
                description: required_str(p, "description")?,
                status,
                due_date: optional_date(p, "dueDate")?,
            };
            fees::record_fee(conn, actor, &new)
        }),
    )
}

fn handle_pay(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let fee_id = required_str(&req.params, "feeId")?;
            fees::pay(conn, actor, &fee_id)
        }),
    )
}

fn handle_mark_pending(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let fee_id = required_str(&req.params, "feeId")?;
            fees::mark_pending(conn, actor, &fee_id)
        }),
    )
}

fn handle_list(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            let list = fees::list_fees(conn, actor, &student_id)?;
            let stats = fees::summarize(list.iter().map(|f| (f.status, f.amount_cents)));
            Ok(json!({ "fees": list, "stats": stats }))
        }),
    )
}

fn handle_summary(state: &mut AppState, req: &Request) -> Value {
    respond(
        req,
        with_actor(state, req, |conn, actor| {
            let student_id = student_param(&req.params, actor)?;
            fees::status_summary(conn, actor, &student_id)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "fees.record" => Some(handle_record(state, req)),
        "fees.pay" => Some(handle_pay(state, req)),
        "fees.markPending" => Some(handle_mark_pending(state, req)),
        "fees.list" => Some(handle_list(state, req)),
        "fees.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}
