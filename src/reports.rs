//! Management read-only projections. Nothing here is stored; every figure is
//! recomputed from the ledgers on each call.

use crate::calc::compute_grade_sheet;
use crate::courses::list_courses;
use crate::error::{AppError, AppResult};
use crate::fees::{self, FeeStatus, FeeSummary};
use crate::identity::{Actor, Role};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub students: i64,
    pub teachers: i64,
    pub management: i64,
    pub courses: i64,
    pub enrollments: i64,
    pub fees: FeeSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEnrollmentReport {
    pub course_id: String,
    pub code: String,
    pub name: String,
    pub registered: i64,
    pub dropped: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAttendanceReport {
    pub course_id: String,
    pub code: String,
    pub present: i64,
    pub absent: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGradesReport {
    pub course_id: String,
    pub code: String,
    pub students: usize,
    pub students_graded: usize,
    pub mean_percentage: Option<f64>,
}

fn count(conn: &Connection, sql: &str) -> AppResult<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

fn all_fees(conn: &Connection) -> AppResult<FeeSummary> {
    let mut stmt = conn.prepare("SELECT status, amount_cents FROM fees")?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(fees::summarize(
        rows.iter()
            .filter_map(|(s, c)| Some((FeeStatus::parse(s)?, *c))),
    ))
}

pub fn dashboard(conn: &Connection, actor: &Actor) -> AppResult<Dashboard> {
    actor.require(&[Role::Management])?;
    Ok(Dashboard {
        students: count(conn, "SELECT COUNT(*) FROM accounts WHERE role = 'student'")?,
        teachers: count(conn, "SELECT COUNT(*) FROM accounts WHERE role = 'teacher'")?,
        management: count(
            conn,
            "SELECT COUNT(*) FROM accounts WHERE role = 'management'",
        )?,
        courses: count(conn, "SELECT COUNT(*) FROM courses")?,
        enrollments: count(
            conn,
            "SELECT COUNT(*) FROM enrollments WHERE status != 'dropped'",
        )?,
        fees: all_fees(conn)?,
    })
}

pub fn enrollment(conn: &Connection, actor: &Actor) -> AppResult<Vec<CourseEnrollmentReport>> {
    actor.require(&[Role::Management])?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.code, c.name,
                COALESCE(SUM(e.status = 'registered'), 0),
                COALESCE(SUM(e.status = 'dropped'), 0),
                COALESCE(SUM(e.status = 'completed'), 0)
         FROM courses c
         LEFT JOIN enrollments e ON e.course_id = c.id
         GROUP BY c.id
         ORDER BY c.code",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CourseEnrollmentReport {
                course_id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                registered: r.get(3)?,
                dropped: r.get(4)?,
                completed: r.get(5)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

pub fn attendance(conn: &Connection, actor: &Actor) -> AppResult<Vec<CourseAttendanceReport>> {
    actor.require(&[Role::Management])?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.code,
                COALESCE(SUM(a.status = 'present'), 0),
                COALESCE(SUM(a.status = 'absent'), 0)
         FROM courses c
         LEFT JOIN attendance a ON a.course_id = c.id
         GROUP BY c.id
         ORDER BY c.code",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let present: i64 = r.get(2)?;
            let absent: i64 = r.get(3)?;
            let total = present + absent;
            Ok(CourseAttendanceReport {
                course_id: r.get(0)?,
                code: r.get(1)?,
                present,
                absent,
                attendance_rate: if total > 0 {
                    present as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

pub fn fees(conn: &Connection, actor: &Actor) -> AppResult<FeeSummary> {
    actor.require(&[Role::Management])?;
    all_fees(conn)
}

/// Mean is taken over students with at least one graded component.
pub fn grades(conn: &Connection, actor: &Actor) -> AppResult<Vec<CourseGradesReport>> {
    actor.require(&[Role::Management])?;
    let mut out = Vec::new();
    for course in list_courses(conn)? {
        let sheet = compute_grade_sheet(conn, &course.id)?;
        let graded: Vec<f64> = sheet
            .students
            .iter()
            .filter(|r| r.standing.graded_count > 0)
            .map(|r| r.standing.percentage)
            .collect();
        out.push(CourseGradesReport {
            course_id: course.id,
            code: course.code,
            students: sheet.students.len(),
            students_graded: graded.len(),
            mean_percentage: (!graded.is_empty())
                .then(|| graded.iter().sum::<f64>() / graded.len() as f64),
        });
    }
    Ok(out)
}

pub fn departments(_conn: &Connection, actor: &Actor) -> AppResult<Vec<String>> {
    actor.require(&[Role::Management])?;
    Err(AppError::Unimplemented("reports.departments".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::enrollment::{enroll, set_status, EnrollmentStatus};
    use crate::test_helper::{admin, new_course, new_student, new_teacher};

    #[test]
    fn dashboard_counts_accounts_and_courses() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let t = new_teacher(&conn, &admin, "T");
        let s1 = new_student(&conn, &admin, "A");
        let s2 = new_student(&conn, &admin, "B");
        let c = new_course(&conn, &admin, "CS101", Some(&t));
        enroll(&conn, &admin, &s1.profile_id, &c).unwrap();
        enroll(&conn, &admin, &s2.profile_id, &c).unwrap();
        set_status(&conn, &admin, &s2.profile_id, &c, EnrollmentStatus::Dropped).unwrap();

        let d = dashboard(&conn, &admin).unwrap();
        assert_eq!((d.students, d.teachers, d.management), (2, 1, 1));
        assert_eq!(d.courses, 1);
        assert_eq!(d.enrollments, 1);

        let e = enrollment(&conn, &admin).unwrap();
        assert_eq!((e[0].registered, e[0].dropped, e[0].completed), (1, 1, 0));

        assert_eq!(dashboard(&conn, &t).unwrap_err().code(), "forbidden");
        assert_eq!(
            departments(&conn, &admin).unwrap_err().code(),
            "not_implemented"
        );
    }

    #[test]
    fn grades_report_skips_ungraded_students_in_mean() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let c = new_course(&conn, &admin, "EMPTY", None);
        let r = grades(&conn, &admin).unwrap();
        assert_eq!(r[0].course_id, c);
        assert!(r[0].mean_percentage.is_none());
        assert_eq!(attendance(&conn, &admin).unwrap()[0].attendance_rate, 0.0);
    }
}
