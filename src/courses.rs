use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::identity::{require_teacher, Actor, Role};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub schedule: Option<String>,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub enrolled_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub code: String,
    pub name: String,
    pub schedule: Option<String>,
    pub teacher_id: Option<String>,
}

/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub schedule: Option<Option<String>>,
    pub teacher_id: Option<Option<String>>,
}

const COURSE_SELECT: &str = "SELECT c.id, c.code, c.name, c.schedule, c.teacher_id, t.name,
        (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id AND e.status != 'dropped')
     FROM courses c
     LEFT JOIN teachers t ON t.id = c.teacher_id";

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok(CourseRow {
        id: r.get(0)?,
        code: r.get(1)?,
        name: r.get(2)?,
        schedule: r.get(3)?,
        teacher_id: r.get(4)?,
        teacher_name: r.get(5)?,
        enrolled_count: r.get(6)?,
    })
}

fn code_owner(conn: &Connection, code: &str) -> AppResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM courses WHERE code = ?",
            [code],
            |r| r.get(0),
        )
        .optional()?)
}

/// Owning teacher id, or `NotFound` if the course does not exist.
pub fn course_teacher(conn: &Connection, course_id: &str) -> AppResult<Option<String>> {
    let row: Option<Option<String>> = conn
        .query_row(
            "SELECT teacher_id FROM courses WHERE id = ?",
            [course_id],
            |r| r.get(0),
        )
        .optional()?;
    row.ok_or_else(|| AppError::not_found("course"))
}

pub fn require_course(conn: &Connection, course_id: &str) -> AppResult<()> {
    course_teacher(conn, course_id).map(|_| ())
}

/// Only the teacher assigned to the course passes.
pub fn require_owner(conn: &Connection, course_id: &str, actor: &Actor) -> AppResult<()> {
    let teacher = course_teacher(conn, course_id)?;
    if actor.is(Role::Teacher) && teacher.as_deref() == Some(actor.profile_id.as_str()) {
        Ok(())
    } else {
        Err(AppError::forbidden("only the course teacher may do this"))
    }
}

pub fn require_owner_or_management(
    conn: &Connection,
    course_id: &str,
    actor: &Actor,
) -> AppResult<()> {
    if actor.is(Role::Management) {
        return require_course(conn, course_id);
    }
    require_owner(conn, course_id, actor)
}

pub fn get_course(conn: &Connection, course_id: &str) -> AppResult<CourseRow> {
    let sql = format!("{COURSE_SELECT} WHERE c.id = ?");
    conn.query_row(&sql, [course_id], course_from_row)
        .optional()?
        .ok_or_else(|| AppError::not_found("course"))
}

pub fn list_courses(conn: &Connection) -> AppResult<Vec<CourseRow>> {
    let sql = format!("{COURSE_SELECT} ORDER BY c.code");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], course_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

pub fn teaching_courses(conn: &Connection, actor: &Actor) -> AppResult<Vec<CourseRow>> {
    actor.require(&[Role::Teacher])?;
    let sql = format!("{COURSE_SELECT} WHERE c.teacher_id = ? ORDER BY c.code");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([&actor.profile_id], course_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

pub fn create_course(conn: &Connection, actor: &Actor, new: &NewCourse) -> AppResult<CourseRow> {
    actor.require(&[Role::Management])?;
    let code = new.code.trim();
    if code.is_empty() {
        return Err(AppError::validation("code must not be empty"));
    }
    if new.name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if code_owner(conn, code)?.is_some() {
        return Err(AppError::conflict(format!(
            "course code {code} already exists"
        )));
    }
    if let Some(teacher_id) = new.teacher_id.as_deref() {
        require_teacher(conn, teacher_id)?;
    }

    let id = new_id();
    conn.execute(
        "INSERT INTO courses(id, code, name, schedule, teacher_id, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            id,
            code,
            new.name.trim(),
            new.schedule,
            new.teacher_id,
            now_timestamp()
        ],
    )?;
    tracing::info!(course_id = %id, code, "course created");
    get_course(conn, &id)
}

pub fn update_course(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
    patch: &CoursePatch,
) -> AppResult<CourseRow> {
    actor.require(&[Role::Management])?;
    let current = get_course(conn, course_id)?;

    let code = match patch.code.as_deref().map(str::trim) {
        Some("") => return Err(AppError::validation("code must not be empty")),
        Some(code) => {
            if let Some(owner) = code_owner(conn, code)? {
                if owner != course_id {
                    return Err(AppError::conflict(format!(
                        "course code {code} already exists"
                    )));
                }
            }
            code.to_string()
        }
        None => current.code,
    };
    let name = match patch.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::validation("name must not be empty")),
        Some(name) => name.to_string(),
        None => current.name,
    };
    let schedule = patch.schedule.clone().unwrap_or(current.schedule);
    let teacher_id = patch.teacher_id.clone().unwrap_or(current.teacher_id);
    if let Some(t) = teacher_id.as_deref() {
        require_teacher(conn, t)?;
    }

    conn.execute(
        "UPDATE courses SET code = ?, name = ?, schedule = ?, teacher_id = ? WHERE id = ?",
        params![code, name, schedule, teacher_id, course_id],
    )?;
    get_course(conn, course_id)
}

/// Removes the course and every row that references it, in one transaction.
pub fn delete_course(conn: &Connection, actor: &Actor, course_id: &str) -> AppResult<()> {
    actor.require(&[Role::Management])?;
    require_course(conn, course_id)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM submissions WHERE component_id IN
            (SELECT id FROM assessment_components WHERE course_id = ?)",
        [course_id],
    )?;
    tx.execute(
        "DELETE FROM quiz_options WHERE question_id IN
            (SELECT q.id FROM quiz_questions q
             JOIN assessment_components a ON a.id = q.component_id
             WHERE a.course_id = ?)",
        [course_id],
    )?;
    tx.execute(
        "DELETE FROM quiz_questions WHERE component_id IN
            (SELECT id FROM assessment_components WHERE course_id = ?)",
        [course_id],
    )?;
    tx.execute(
        "DELETE FROM assessment_components WHERE course_id = ?",
        [course_id],
    )?;
    tx.execute("DELETE FROM attendance WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM enrollments WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM notices WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM courses WHERE id = ?", [course_id])?;
    tx.commit()?;

    tracing::info!(course_id, "course deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::test_helper::{admin, new_course, new_teacher};

    #[test]
    fn duplicate_code_conflicts_on_create_and_update() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        new_course(&conn, &admin, "CS101", None);
        let other = new_course(&conn, &admin, "CS102", None);

        let err = create_course(
            &conn,
            &admin,
            &NewCourse {
                code: "CS101".into(),
                name: "Again".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "conflict");

        let err = update_course(
            &conn,
            &admin,
            &other,
            &CoursePatch {
                code: Some("CS101".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "conflict");

        // Keeping its own code is fine.
        let same = update_course(
            &conn,
            &admin,
            &other,
            &CoursePatch {
                code: Some("CS102".into()),
                schedule: Some(Some("Mon 9:00".into())),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(same.schedule.as_deref(), Some("Mon 9:00"));
    }

    #[test]
    fn unknown_teacher_is_not_found() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let err = create_course(
            &conn,
            &admin,
            &NewCourse {
                code: "MA1".into(),
                name: "Algebra".into(),
                teacher_id: Some("nobody".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn list_is_ordered_by_code_and_teaching_filters() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let teacher = new_teacher(&conn, &admin, "Turing");
        new_course(&conn, &admin, "ZZ9", None);
        new_course(&conn, &admin, "AA1", Some(&teacher));

        let codes: Vec<String> = list_courses(&conn).unwrap().into_iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["AA1", "ZZ9"]);

        let mine = teaching_courses(&conn, &teacher).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].teacher_name.as_deref(), Some("Turing"));
    }
}
