use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::identity::{require_self_or_management, require_student, Actor, Role};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Unpaid,
    Pending,
    Paid,
}

impl FeeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeeStatus::Unpaid => "unpaid",
            FeeStatus::Pending => "pending",
            FeeStatus::Paid => "paid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unpaid" => Some(FeeStatus::Unpaid),
            "pending" => Some(FeeStatus::Pending),
            "paid" => Some(FeeStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    pub id: String,
    pub student_id: String,
    pub description: String,
    pub amount: f64,
    pub amount_cents: i64,
    pub status: FeeStatus,
    pub due_date: Option<String>,
    pub payment_date: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFee {
    pub student_id: String,
    pub amount: f64,
    pub description: String,
    pub status: FeeStatus,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub total_fees: f64,
    pub paid_fees: f64,
    pub pending_fees: f64,
    pub unpaid_fees: f64,
    pub paid_percentage: f64,
    pub fee_count: i64,
}

/// Largest single fee, in currency units.
pub const MAX_AMOUNT: f64 = 100_000_000.0;

/// Money is stored as integer cents.
pub fn to_cents(amount: f64) -> AppResult<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::validation("amount must be greater than 0"));
    }
    if amount > MAX_AMOUNT {
        return Err(AppError::validation(format!(
            "amount must not exceed {MAX_AMOUNT:.2}"
        )));
    }
    let cents = (amount * 100.0).round();
    if cents < 1.0 {
        return Err(AppError::validation("amount is below one cent"));
    }
    Ok(cents as i64)
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Totals accumulate in `i128`.
pub fn summarize<I>(fees: I) -> FeeSummary
where
    I: IntoIterator<Item = (FeeStatus, i64)>,
{
    let (mut total, mut paid, mut pending, mut unpaid) = (0i128, 0i128, 0i128, 0i128);
    let mut count = 0i64;
    for (status, cents) in fees {
        let cents = i128::from(cents);
        count += 1;
        total += cents;
        match status {
            FeeStatus::Paid => paid += cents,
            FeeStatus::Pending => pending += cents,
            FeeStatus::Unpaid => unpaid += cents,
        }
    }
    let units = |c: i128| c as f64 / 100.0;
    FeeSummary {
        total_fees: units(total),
        paid_fees: units(paid),
        pending_fees: units(pending),
        unpaid_fees: units(unpaid),
        paid_percentage: if total > 0 {
            paid as f64 / total as f64 * 100.0
        } else {
            0.0
        },
        fee_count: count,
    }
}

const FEE_COLUMNS: &str =
    "id, student_id, description, amount_cents, status, due_date, payment_date, created_at";

fn fee_from_row(r: &Row<'_>) -> rusqlite::Result<Fee> {
    let cents: i64 = r.get(3)?;
    let status: String = r.get(4)?;
    Ok(Fee {
        id: r.get(0)?,
        student_id: r.get(1)?,
        description: r.get(2)?,
        amount: from_cents(cents),
        amount_cents: cents,
        status: FeeStatus::parse(&status).unwrap_or(FeeStatus::Unpaid),
        due_date: r.get(5)?,
        payment_date: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn fee(conn: &Connection, fee_id: &str) -> AppResult<Fee> {
    let sql = format!("SELECT {FEE_COLUMNS} FROM fees WHERE id = ?");
    conn.query_row(&sql, [fee_id], fee_from_row)
        .optional()?
        .ok_or_else(|| AppError::not_found("fee"))
}

pub fn record_fee(conn: &Connection, actor: &Actor, new: &NewFee) -> AppResult<Fee> {
    actor.require(&[Role::Management])?;
    let cents = to_cents(new.amount)?;
    if new.description.trim().is_empty() {
        return Err(AppError::validation("description must not be empty"));
    }
    require_student(conn, &new.student_id)?;

    let id = new_id();
    let now = now_timestamp();
    let payment_date = (new.status == FeeStatus::Paid).then(|| now.clone());
    conn.execute(
        "INSERT INTO fees(id, student_id, description, amount_cents, status, due_date,
                          payment_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            new.student_id,
            new.description.trim(),
            cents,
            new.status.as_str(),
            new.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            payment_date,
            now
        ],
    )?;
    tracing::info!(fee_id = %id, student_id = %new.student_id, cents, "fee recorded");
    fee(conn, &id)
}

/// A second payment is a conflict and leaves the stored row untouched.
pub fn pay(conn: &Connection, actor: &Actor, fee_id: &str) -> AppResult<Fee> {
    let current = fee(conn, fee_id)?;
    require_self_or_management(actor, &current.student_id)?;
    if current.status == FeeStatus::Paid {
        return Err(AppError::conflict("fee is already paid"));
    }
    let changed = conn.execute(
        "UPDATE fees SET status = 'paid', payment_date = ? WHERE id = ? AND status != 'paid'",
        params![now_timestamp(), fee_id],
    )?;
    if changed == 0 {
        return Err(AppError::conflict("fee is already paid"));
    }
    tracing::info!(fee_id, "fee paid");
    fee(conn, fee_id)
}

pub fn mark_pending(conn: &Connection, actor: &Actor, fee_id: &str) -> AppResult<Fee> {
    let current = fee(conn, fee_id)?;
    require_self_or_management(actor, &current.student_id)?;
    let changed = conn.execute(
        "UPDATE fees SET status = 'pending' WHERE id = ? AND status = 'unpaid'",
        [fee_id],
    )?;
    if changed == 0 {
        return Err(AppError::conflict(format!(
            "fee is {}, only unpaid fees can become pending",
            current.status.as_str()
        )));
    }
    fee(conn, fee_id)
}

pub fn list_fees(conn: &Connection, actor: &Actor, student_id: &str) -> AppResult<Vec<Fee>> {
    require_self_or_management(actor, student_id)?;
    require_student(conn, student_id)?;
    let sql = format!(
        "SELECT {FEE_COLUMNS} FROM fees WHERE student_id = ? ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], fee_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

pub fn status_summary(conn: &Connection, actor: &Actor, student_id: &str) -> AppResult<FeeSummary> {
    let fees = list_fees(conn, actor, student_id)?;
    Ok(summarize(fees.iter().map(|f| (f.status, f.amount_cents))))
}
