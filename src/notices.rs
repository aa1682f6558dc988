use crate::courses::{require_course, require_owner};
use crate::db::{new_id, now_timestamp};
use crate::enrollment::require_course_reader;
use crate::error::{AppError, AppResult};
use crate::identity::{Actor, Role};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_account_id: String,
    pub author_role: Role,
    pub author_name: Option<String>,
    pub course_id: Option<String>,
    pub course_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const NOTICE_SELECT: &str = "SELECT n.id, n.title, n.content, n.author_account_id, n.author_role,
        COALESCE(m.name, t.name, s.name), n.course_id, c.code, n.created_at, n.updated_at
     FROM notices n
     LEFT JOIN management m ON m.account_id = n.author_account_id
     LEFT JOIN teachers t ON t.account_id = n.author_account_id
     LEFT JOIN students s ON s.account_id = n.author_account_id
     LEFT JOIN courses c ON c.id = n.course_id";

const NOTICE_ORDER: &str = "ORDER BY n.created_at DESC, n.rowid DESC";

fn notice_from_row(r: &Row<'_>) -> rusqlite::Result<Notice> {
    let role: String = r.get(4)?;
    Ok(Notice {
        id: r.get(0)?,
        title: r.get(1)?,
        content: r.get(2)?,
        author_account_id: r.get(3)?,
        author_role: Role::parse(&role).unwrap_or(Role::Management),
        author_name: r.get(5)?,
        course_id: r.get(6)?,
        course_code: r.get(7)?,
        created_at: r.get(8)?,
        updated_at: r.get(9)?,
    })
}

fn notice(conn: &Connection, notice_id: &str) -> AppResult<Notice> {
    let sql = format!("{NOTICE_SELECT} WHERE n.id = ?");
    conn.query_row(&sql, [notice_id], notice_from_row)
        .optional()?
        .ok_or_else(|| AppError::not_found("notice"))
}

fn select_notices(conn: &Connection, filter: &str, bind: &[&str]) -> AppResult<Vec<Notice>> {
    let sql = format!("{NOTICE_SELECT} WHERE {filter} {NOTICE_ORDER}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(bind), notice_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

fn require_text(title: &str, content: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if content.trim().is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    Ok(())
}

/// Teachers may only scope a notice to a course they teach.
pub fn post(
    conn: &Connection,
    actor: &Actor,
    title: &str,
    content: &str,
    course_id: Option<&str>,
) -> AppResult<Notice> {
    actor.require(&[Role::Teacher, Role::Management])?;
    require_text(title, content)?;
    if let Some(course_id) = course_id {
        match actor.role {
            Role::Teacher => require_owner(conn, course_id, actor)?,
            _ => require_course(conn, course_id)?,
        }
    }

    let id = new_id();
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO notices(id, title, content, author_account_id, author_role, course_id,
                             created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            title.trim(),
            content.trim(),
            actor.account_id,
            actor.role.as_str(),
            course_id,
            now,
            now
        ],
    )?;
    notice(conn, &id)
}

pub fn list(conn: &Connection, actor: &Actor, course_id: Option<&str>) -> AppResult<Vec<Notice>> {
    if let Some(course_id) = course_id {
        require_course_reader(conn, course_id, actor)?;
        return select_notices(conn, "n.course_id = ?", &[course_id]);
    }
    match actor.role {
        Role::Management => select_notices(conn, "1 = 1", &[]),
        Role::Student => select_notices(
            conn,
            "n.course_id IS NULL OR n.course_id IN
                (SELECT course_id FROM enrollments WHERE student_id = ?)",
            &[actor.profile_id.as_str()],
        ),
        Role::Teacher => select_notices(
            conn,
            "n.course_id IS NULL OR n.course_id IN
                (SELECT id FROM courses WHERE teacher_id = ?)",
            &[actor.profile_id.as_str()],
        ),
    }
}

fn require_author_or_management(actor: &Actor, notice: &Notice) -> AppResult<()> {
    if actor.is(Role::Management) || actor.account_id == notice.author_account_id {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "only the author or management may change this notice",
        ))
    }
}

pub fn update(
    conn: &Connection,
    actor: &Actor,
    notice_id: &str,
    title: Option<&str>,
    content: Option<&str>,
) -> AppResult<Notice> {
    let current = notice(conn, notice_id)?;
    require_author_or_management(actor, &current)?;
    let title = title.unwrap_or(&current.title);
    let content = content.unwrap_or(&current.content);
    require_text(title, content)?;
    conn.execute(
        "UPDATE notices SET title = ?, content = ?, updated_at = ? WHERE id = ?",
        params![title.trim(), content.trim(), now_timestamp(), notice_id],
    )?;
    notice(conn, notice_id)
}

pub fn delete(conn: &Connection, actor: &Actor, notice_id: &str) -> AppResult<()> {
    let current = notice(conn, notice_id)?;
    require_author_or_management(actor, &current)?;
    conn.execute("DELETE FROM notices WHERE id = ?", [notice_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::enrollment::enroll;
    use crate::test_helper::{admin, new_course, new_student, new_teacher};

    #[test]
    fn students_see_global_and_their_courses() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let t = new_teacher(&conn, &admin, "T");
        let s = new_student(&conn, &admin, "S");
        let mine = new_course(&conn, &admin, "CS101", Some(&t));
        let theirs = new_course(&conn, &admin, "CS102", Some(&t));
        enroll(&conn, &s, &s.profile_id, &mine).unwrap();

        post(&conn, &admin, "Welcome", "Term starts Monday", None).unwrap();
        post(&conn, &t, "HW1", "Due Friday", Some(&mine)).unwrap();
        post(&conn, &t, "Lab", "Room change", Some(&theirs)).unwrap();

        let seen: Vec<String> = list(&conn, &s, None)
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(seen, vec!["HW1", "Welcome"]);
        assert_eq!(list(&conn, &admin, None).unwrap().len(), 3);
        assert_eq!(
            list(&conn, &s, Some(&theirs)).unwrap_err().code(),
            "forbidden"
        );
    }

    #[test]
    fn teachers_scope_only_to_their_courses() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let t = new_teacher(&conn, &admin, "T");
        let other = new_teacher(&conn, &admin, "O");
        let c = new_course(&conn, &admin, "CS101", Some(&t));
        assert_eq!(
            post(&conn, &other, "x", "y", Some(&c)).unwrap_err().code(),
            "forbidden"
        );
        let s = new_student(&conn, &admin, "S");
        assert_eq!(
            post(&conn, &s, "x", "y", None).unwrap_err().code(),
            "forbidden"
        );
    }

    #[test]
    fn only_author_or_management_edits() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let t = new_teacher(&conn, &admin, "T");
        let other = new_teacher(&conn, &admin, "O");
        let n = post(&conn, &t, "Title", "Body", None).unwrap();
        assert_eq!(n.author_name.as_deref(), Some("T"));

        assert_eq!(
            update(&conn, &other, &n.id, Some("Hijack"), None).unwrap_err().code(),
            "forbidden"
        );
        let edited = update(&conn, &t, &n.id, None, Some("New body")).unwrap();
        assert_eq!(edited.title, "Title");
        assert_eq!(edited.content, "New body");
        delete(&conn, &admin, &n.id).unwrap();
        assert_eq!(delete(&conn, &t, &n.id).unwrap_err().code(), "not_found");
    }
}
