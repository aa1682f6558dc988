use crate::courses::{require_course, require_owner, require_owner_or_management};
use crate::db::{new_id, now_timestamp};
use crate::enrollment::require_active_enrollment;
use crate::error::{AppError, AppResult};
use crate::identity::{require_self_or_management, require_student, Actor};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceMark {
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_classes: i64,
    pub present: i64,
    pub absent: i64,
    pub present_percentage: f64,
    pub absent_percentage: f64,
}

pub fn summarize<I>(statuses: I) -> AttendanceSummary
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let mut present = 0;
    let mut absent = 0;
    for s in statuses {
        match s {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
        }
    }
    let total = present + absent;
    let pct = |n: i64| {
        if total > 0 {
            n as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    };
    AttendanceSummary {
        total_classes: total,
        present,
        absent,
        present_percentage: pct(present),
        absent_percentage: pct(absent),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub course_id: String,
    pub course_code: String,
    pub student_id: String,
    pub student_name: String,
    pub date: String,
    pub status: AttendanceStatus,
    pub marked_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub records: Vec<AttendanceRow>,
    pub summary: AttendanceSummary,
}

fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Replaces the whole (course, date) snapshot with `records`.
pub fn mark(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
    date: NaiveDate,
    records: &[AttendanceMark],
) -> AppResult<usize> {
    require_course(conn, course_id)?;
    require_owner(conn, course_id, actor)?;

    let mut seen = HashSet::new();
    for r in records {
        if !seen.insert(r.student_id.as_str()) {
            return Err(AppError::validation(format!(
                "student {} appears more than once",
                r.student_id
            )));
        }
    }
    for r in records {
        require_active_enrollment(conn, &r.student_id, course_id)?;
    }

    let day = fmt_date(date);
    let now = now_timestamp();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance WHERE course_id = ? AND date = ?",
        [course_id, day.as_str()],
    )?;
    for r in records {
        tx.execute(
            "INSERT INTO attendance(id, course_id, student_id, date, status, marked_by, marked_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                new_id(),
                course_id,
                r.student_id,
                day,
                r.status.as_str(),
                actor.profile_id,
                now
            ],
        )?;
    }
    tx.commit()?;
    tracing::debug!(course_id, date = %day, count = records.len(), "attendance marked");
    Ok(records.len())
}

fn query_rows(conn: &Connection, filter: &str, bind: &[&str]) -> AppResult<Vec<AttendanceRow>> {
    let sql = format!(
        "SELECT a.course_id, c.code, a.student_id, s.name, a.date, a.status, a.marked_at
         FROM attendance a
         JOIN courses c ON c.id = a.course_id
         JOIN students s ON s.id = a.student_id
         WHERE {filter}
         ORDER BY a.date, c.code, s.name, s.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<(String, String, String, String, String, String, String)> = stmt
        .query_map(rusqlite::params_from_iter(bind), |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows
        .into_iter()
        .filter_map(
            |(course_id, course_code, student_id, student_name, date, status, marked_at)| {
                Some(AttendanceRow {
                    course_id,
                    course_code,
                    student_id,
                    student_name,
                    date,
                    status: AttendanceStatus::parse(&status)?,
                    marked_at,
                })
            },
        )
        .collect())
}

pub fn course_attendance(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
    date: Option<NaiveDate>,
) -> AppResult<Vec<AttendanceRow>> {
    require_owner_or_management(conn, course_id, actor)?;
    match date {
        Some(d) => {
            let day = fmt_date(d);
            query_rows(
                conn,
                "a.course_id = ? AND a.date = ?",
                &[course_id, day.as_str()],
            )
        }
        None => query_rows(conn, "a.course_id = ?", &[course_id]),
    }
}

/// Computed on read over every row for the student.
pub fn summary(conn: &Connection, actor: &Actor, student_id: &str) -> AppResult<AttendanceSummary> {
    require_self_or_management(actor, student_id)?;
    require_student(conn, student_id)?;
    let mut stmt = conn.prepare("SELECT status FROM attendance WHERE student_id = ?")?;
    let statuses: Vec<String> = stmt
        .query_map([student_id], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(summarize(
        statuses.iter().filter_map(|s| AttendanceStatus::parse(s)),
    ))
}

pub fn student_attendance(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
) -> AppResult<StudentAttendance> {
    require_self_or_management(actor, student_id)?;
    require_student(conn, student_id)?;
    let records = query_rows(conn, "a.student_id = ?", &[student_id])?;
    let summary = summarize(records.iter().map(|r| r.status));
    Ok(StudentAttendance { records, summary })
}
