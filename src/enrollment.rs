use crate::courses::{require_course, require_owner_or_management, CourseRow};
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::identity::{require_self_or_management, require_student, Actor, Role};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Registered,
    Dropped,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Registered => "registered",
            EnrollmentStatus::Dropped => "dropped",
            EnrollmentStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "registered" => Some(EnrollmentStatus::Registered),
            "dropped" => Some(EnrollmentStatus::Dropped),
            "completed" => Some(EnrollmentStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRow {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledStudent {
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub roll_number: Option<String>,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyCourse {
    #[serde(flatten)]
    pub course: CourseRow,
    pub status: EnrollmentStatus,
}

pub fn enrollment_status(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> AppResult<Option<EnrollmentStatus>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT status FROM enrollments WHERE student_id = ? AND course_id = ?",
            [student_id, course_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(raw.as_deref().and_then(EnrollmentStatus::parse))
}

/// Grading and attendance accept any enrollment that has not been dropped.
pub fn require_active_enrollment(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> AppResult<()> {
    match enrollment_status(conn, student_id, course_id)? {
        Some(EnrollmentStatus::Registered) | Some(EnrollmentStatus::Completed) => Ok(()),
        Some(EnrollmentStatus::Dropped) => Err(AppError::validation(format!(
            "student {student_id} has dropped this course"
        ))),
        None => Err(AppError::validation(format!(
            "student {student_id} is not enrolled in this course"
        ))),
    }
}

/// New submissions need a live registration.
pub fn require_registered(conn: &Connection, student_id: &str, course_id: &str) -> AppResult<()> {
    match enrollment_status(conn, student_id, course_id)? {
        Some(EnrollmentStatus::Registered) => Ok(()),
        _ => Err(AppError::validation(format!(
            "student {student_id} is not registered in this course"
        ))),
    }
}

/// Read access to course content: the owner, management, or any enrolled student.
pub fn require_course_reader(conn: &Connection, course_id: &str, actor: &Actor) -> AppResult<()> {
    if actor.is(Role::Student) {
        require_course(conn, course_id)?;
        return match enrollment_status(conn, &actor.profile_id, course_id)? {
            Some(_) => Ok(()),
            None => Err(AppError::forbidden("not enrolled in this course")),
        };
    }
    require_owner_or_management(conn, course_id, actor)
}

pub fn enroll(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
    course_id: &str,
) -> AppResult<EnrollmentRow> {
    require_self_or_management(actor, student_id)?;
    require_course(conn, course_id)?;
    require_student(conn, student_id)?;
    if enrollment_status(conn, student_id, course_id)?.is_some() {
        return Err(AppError::conflict(
            "student is already enrolled in this course",
        ));
    }

    let id = new_id();
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO enrollments(id, student_id, course_id, status, created_at, updated_at)
         VALUES(?, ?, ?, 'registered', ?, ?)",
        params![id, student_id, course_id, now, now],
    )?;
    tracing::debug!(student_id, course_id, "enrolled");
    Ok(EnrollmentRow {
        id,
        student_id: student_id.to_string(),
        course_id: course_id.to_string(),
        status: EnrollmentStatus::Registered,
        created_at: now,
    })
}

pub fn list_enrolled(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
) -> AppResult<Vec<EnrolledStudent>> {
    require_owner_or_management(conn, course_id, actor)?;
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.email, s.roll_number, e.status
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.course_id = ?
         ORDER BY s.name, s.id",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, String>(4)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows
        .into_iter()
        .filter_map(|(student_id, name, email, roll_number, status)| {
            Some(EnrolledStudent {
                student_id,
                name,
                email,
                roll_number,
                status: EnrollmentStatus::parse(&status)?,
            })
        })
        .collect())
}

/// Courses with no enrollment row of any status for the student.
pub fn list_available(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
) -> AppResult<Vec<CourseRow>> {
    require_self_or_management(actor, student_id)?;
    require_student(conn, student_id)?;
    let enrolled: Vec<String> = {
        let mut stmt = conn.prepare("SELECT course_id FROM enrollments WHERE student_id = ?")?;
        let rows = stmt
            .query_map([student_id], |r| r.get(0))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        rows
    };
    Ok(crate::courses::list_courses(conn)?
        .into_iter()
        .filter(|c| !enrolled.contains(&c.id))
        .collect())
}

pub fn my_courses(conn: &Connection, actor: &Actor) -> AppResult<Vec<MyCourse>> {
    actor.require(&[Role::Student])?;
    let mut stmt = conn.prepare(
        "SELECT course_id, status FROM enrollments WHERE student_id = ?",
    )?;
    let statuses: Vec<(String, String)> = stmt
        .query_map([&actor.profile_id], |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    Ok(crate::courses::list_courses(conn)?
        .into_iter()
        .filter_map(|course| {
            let (_, status) = statuses.iter().find(|(id, _)| *id == course.id)?;
            Some(MyCourse {
                status: EnrollmentStatus::parse(status)?,
                course,
            })
        })
        .collect())
}

/// Removes the pair's submissions and attendance before the enrollment itself.
pub fn unenroll(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
    course_id: &str,
) -> AppResult<()> {
    actor.require(&[Role::Management])?;
    if enrollment_status(conn, student_id, course_id)?.is_none() {
        return Err(AppError::not_found("enrollment"));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM submissions WHERE student_id = ? AND component_id IN
            (SELECT id FROM assessment_components WHERE course_id = ?)",
        [student_id, course_id],
    )?;
    tx.execute(
        "DELETE FROM attendance WHERE student_id = ? AND course_id = ?",
        [student_id, course_id],
    )?;
    tx.execute(
        "DELETE FROM enrollments WHERE student_id = ? AND course_id = ?",
        [student_id, course_id],
    )?;
    tx.commit()?;
    tracing::info!(student_id, course_id, "unenrolled");
    Ok(())
}

pub fn set_status(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
    course_id: &str,
    status: EnrollmentStatus,
) -> AppResult<()> {
    actor.require(&[Role::Management])?;
    let changed = conn.execute(
        "UPDATE enrollments SET status = ?, updated_at = ? WHERE student_id = ? AND course_id = ?",
        params![status.as_str(), now_timestamp(), student_id, course_id],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("enrollment"));
    }
    Ok(())
}
