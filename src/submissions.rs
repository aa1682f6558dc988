use crate::catalog::component;
use crate::courses::require_owner;
use crate::db::{new_id, now_timestamp};
use crate::enrollment::require_registered;
use crate::error::{AppError, AppResult};
use crate::identity::{require_student, Actor, Role};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub component_id: String,
    pub student_id: String,
    pub content: Option<String>,
    pub submitted_at: String,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub graded_at: Option<String>,
    pub graded_by: Option<String>,
    pub version: i64,
}

/// A submission with enough context for a teacher's work queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    pub student_name: String,
    pub component_title: String,
    pub course_id: String,
    pub course_code: String,
}

const SUBMISSION_COLUMNS: &str = "s.id, s.component_id, s.student_id, s.content, s.submitted_at,
        s.score, s.feedback, s.graded_at, s.graded_by, s.version";

fn submission_from_row(r: &Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: r.get(0)?,
        component_id: r.get(1)?,
        student_id: r.get(2)?,
        content: r.get(3)?,
        submitted_at: r.get(4)?,
        score: r.get(5)?,
        feedback: r.get(6)?,
        graded_at: r.get(7)?,
        graded_by: r.get(8)?,
        version: r.get(9)?,
    })
}

pub fn find_submission(
    conn: &Connection,
    student_id: &str,
    component_id: &str,
) -> AppResult<Option<Submission>> {
    let sql = format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions s
         WHERE s.student_id = ? AND s.component_id = ?"
    );
    Ok(conn
        .query_row(&sql, [student_id, component_id], submission_from_row)
        .optional()?)
}

/// Creates the ungraded row, or refreshes the content of one not yet graded.
pub fn submit(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
    component_id: &str,
    content: Option<&str>,
) -> AppResult<Submission> {
    let comp = component(conn, component_id)?;
    match actor.role {
        Role::Student if actor.profile_id == student_id => {}
        Role::Teacher => require_owner(conn, &comp.course_id, actor)?,
        _ => return Err(AppError::forbidden("not permitted to submit for this student")),
    }
    require_student(conn, student_id)?;
    require_registered(conn, student_id, &comp.course_id)?;

    let now = now_timestamp();
    match find_submission(conn, student_id, component_id)? {
        Some(existing) if existing.score.is_some() => Err(AppError::conflict(
            "submission has already been graded",
        )),
        Some(existing) => {
            conn.execute(
                "UPDATE submissions SET content = ?, submitted_at = ? WHERE id = ?",
                params![content, now, existing.id],
            )?;
            find_submission(conn, student_id, component_id)?
                .ok_or_else(|| AppError::not_found("submission"))
        }
        None => {
            conn.execute(
                "INSERT INTO submissions(id, component_id, student_id, content, submitted_at,
                                         version)
                 VALUES(?, ?, ?, ?, ?, 0)",
                params![new_id(), component_id, student_id, content, now],
            )?;
            tracing::debug!(student_id, component_id, "submission recorded");
            find_submission(conn, student_id, component_id)?
                .ok_or_else(|| AppError::not_found("submission"))
        }
    }
}

fn teacher_queue(
    conn: &Connection,
    actor: &Actor,
    filter: &str,
    order: &str,
    limit: i64,
) -> AppResult<Vec<SubmissionView>> {
    actor.require(&[Role::Teacher])?;
    let sql = format!(
        "SELECT {SUBMISSION_COLUMNS}, st.name, a.title, c.id, c.code
         FROM submissions s
         JOIN assessment_components a ON a.id = s.component_id
         JOIN courses c ON c.id = a.course_id
         JOIN students st ON st.id = s.student_id
         WHERE c.teacher_id = ? {filter}
         ORDER BY {order}
         LIMIT ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![actor.profile_id, limit], |r| {
            Ok(SubmissionView {
                submission: submission_from_row(r)?,
                student_name: r.get(10)?,
                component_title: r.get(11)?,
                course_id: r.get(12)?,
                course_code: r.get(13)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

/// Ungraded work across the teacher's courses, oldest first.
pub fn pending_for_teacher(conn: &Connection, actor: &Actor) -> AppResult<Vec<SubmissionView>> {
    teacher_queue(
        conn,
        actor,
        "AND s.score IS NULL",
        "s.submitted_at, s.rowid",
        -1,
    )
}

pub fn recent_for_teacher(
    conn: &Connection,
    actor: &Actor,
    limit: i64,
) -> AppResult<Vec<SubmissionView>> {
    if limit < 1 {
        return Err(AppError::validation("limit must be at least 1"));
    }
    teacher_queue(conn, actor, "", "s.submitted_at DESC, s.rowid DESC", limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::enrollment::{enroll, set_status, EnrollmentStatus};
    use crate::test_helper::{admin, assignment, new_course, new_student, new_teacher};

    #[test]
    fn resubmitting_refreshes_until_graded() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let t = new_teacher(&conn, &admin, "T");
        let s = new_student(&conn, &admin, "S");
        let c = new_course(&conn, &admin, "CS101", Some(&t));
        enroll(&conn, &s, &s.profile_id, &c).unwrap();
        let a = assignment(&conn, &t, &c, "HW1", 10.0);

        submit(&conn, &s, &s.profile_id, &a, Some("v1")).unwrap();
        let second = submit(&conn, &s, &s.profile_id, &a, Some("v2")).unwrap();
        assert_eq!(second.content.as_deref(), Some("v2"));

        conn.execute(
            "UPDATE submissions SET score = 5 WHERE id = ?",
            [&second.id],
        )
            .unwrap();
        let err = submit(&conn, &s, &s.profile_id, &a, Some("v3")).unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn dropped_students_cannot_submit() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let t = new_teacher(&conn, &admin, "T");
        let s = new_student(&conn, &admin, "S");
        let other = new_student(&conn, &admin, "O");
        let c = new_course(&conn, &admin, "CS101", Some(&t));
        enroll(&conn, &s, &s.profile_id, &c).unwrap();
        let a = assignment(&conn, &t, &c, "HW1", 10.0);
        set_status(&conn, &admin, &s.profile_id, &c, EnrollmentStatus::Dropped).unwrap();

        assert_eq!(
            submit(&conn, &s, &s.profile_id, &a, None).unwrap_err().code(),
            "bad_params"
        );
        assert_eq!(
            submit(&conn, &other, &s.profile_id, &a, None).unwrap_err().code(),
            "forbidden"
        );
    }

    #[test]
    fn queues_are_scoped_to_the_teacher() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let t1 = new_teacher(&conn, &admin, "T1");
        let t2 = new_teacher(&conn, &admin, "T2");
        let s = new_student(&conn, &admin, "S");
        let c1 = new_course(&conn, &admin, "CS101", Some(&t1));
        let c2 = new_course(&conn, &admin, "CS102", Some(&t2));
        enroll(&conn, &s, &s.profile_id, &c1).unwrap();
        enroll(&conn, &s, &s.profile_id, &c2).unwrap();
        let a1 = assignment(&conn, &t1, &c1, "HW1", 10.0);
        let a2 = assignment(&conn, &t1, &c1, "HW2", 10.0);
        let b1 = assignment(&conn, &t2, &c2, "Essay", 10.0);
        submit(&conn, &s, &s.profile_id, &a1, None).unwrap();
        submit(&conn, &s, &s.profile_id, &b1, None).unwrap();
        submit(&conn, &t1, &s.profile_id, &a2, Some("paper copy")).unwrap();

        let pending = pending_for_teacher(&conn, &t1).unwrap();
        let titles: Vec<&str> = pending.iter().map(|p| p.component_title.as_str()).collect();
        assert_eq!(titles, vec!["HW1", "HW2"]);

        let recent = recent_for_teacher(&conn, &t1, 1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].component_title, "HW2");
        assert_eq!(
            pending_for_teacher(&conn, &s).unwrap_err().code(),
            "forbidden"
        );
    }
}
