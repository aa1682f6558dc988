use crate::catalog::{component, course_components, ComponentKind};
use crate::courses::{get_course, require_owner, require_owner_or_management};
use crate::db::now_timestamp;
use crate::enrollment::{require_active_enrollment, EnrollmentStatus};
use crate::error::{AppError, AppResult};
use crate::identity::{require_self_or_management, Actor};
use crate::submissions::{find_submission, Submission};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreState {
    Ungraded,
    Graded(f64),
}

impl ScoreState {
    pub fn from_option(score: Option<f64>) -> Self {
        match score {
            Some(v) => ScoreState::Graded(v),
            None => ScoreState::Ungraded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub total_obtained: f64,
    pub total_possible: f64,
    pub percentage: f64,
    pub graded_count: usize,
    pub ungraded_count: usize,
}

/// Percentage of graded work only: ungraded components add nothing to
/// either side of the ratio.
pub fn standing<I>(cells: I) -> Standing
where
    I: IntoIterator<Item = (ScoreState, f64)>,
{
    let mut total_obtained = 0.0;
    let mut total_possible = 0.0;
    let mut graded_count = 0;
    let mut ungraded_count = 0;

    for (state, max_score) in cells {
        match state {
            ScoreState::Ungraded => ungraded_count += 1,
            ScoreState::Graded(v) => {
                graded_count += 1;
                total_obtained += v;
                total_possible += max_score;
            }
        }
    }

    let percentage = if total_possible > 0.0 {
        (total_obtained / total_possible * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    Standing {
        total_obtained,
        total_possible,
        percentage,
        graded_count,
        ungraded_count,
    }
}

/// Σ(score/max × weight) / Σ weight over graded rubric items; `None` when
/// nothing weighted has been graded.
pub fn weighted_percentage<I>(items: I) -> Option<f64>
where
    I: IntoIterator<Item = (ScoreState, f64, f64)>,
{
    let mut num = 0.0;
    let mut denom = 0.0;
    for (state, max_score, weight) in items {
        if let ScoreState::Graded(v) = state {
            if max_score > 0.0 && weight > 0.0 {
                num += (v / max_score).clamp(0.0, 1.0) * weight;
                denom += weight;
            }
        }
    }
    (denom > 0.0).then(|| num / denom * 100.0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetComponent {
    pub id: String,
    pub title: String,
    pub kind: ComponentKind,
    pub max_score: f64,
    pub weight: Option<f64>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub student_id: String,
    pub name: String,
    pub status: EnrollmentStatus,
    /// Aligned with `GradeSheet::components`; `None` is ungraded.
    pub scores: Vec<Option<f64>>,
    #[serde(flatten)]
    pub standing: Standing,
    pub weighted_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSheet {
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub components: Vec<SheetComponent>,
    pub students: Vec<SheetRow>,
}

fn sheet_students(
    conn: &Connection,
    course_id: &str,
) -> AppResult<Vec<(String, String, EnrollmentStatus)>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, e.status
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.course_id = ? AND e.status != 'dropped'
         ORDER BY s.name, s.id",
    )?;
    let rows: Vec<(String, String, String)> = stmt
        .query_map([course_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, name, status)| {
            Some((id, name, EnrollmentStatus::parse(&status)?))
        })
        .collect())
}

fn course_scores(conn: &Connection, course_id: &str) -> AppResult<HashMap<(String, String), f64>> {
    let mut stmt = conn.prepare(
        "SELECT s.student_id, s.component_id, s.score
         FROM submissions s
         JOIN assessment_components a ON a.id = s.component_id
         WHERE a.course_id = ? AND s.score IS NOT NULL",
    )?;
    let rows: Vec<(String, String, f64)> = stmt
        .query_map([course_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows
        .into_iter()
        .map(|(student, comp, score)| ((student, comp), score))
        .collect())
}

/// Builds the score matrix and per-student totals from current rows.
pub fn compute_grade_sheet(conn: &Connection, course_id: &str) -> AppResult<GradeSheet> {
    let course = get_course(conn, course_id)?;
    let components = course_components(conn, course_id)?;
    let students = sheet_students(conn, course_id)?;
    let scores = course_scores(conn, course_id)?;

    let rows = students
        .into_iter()
        .map(|(student_id, name, status)| {
            let cells: Vec<Option<f64>> = components
                .iter()
                .map(|c| scores.get(&(student_id.clone(), c.id.clone())).copied())
                .collect();
            let standing = standing(
                components
                    .iter()
                    .zip(&cells)
                    .map(|(c, s)| (ScoreState::from_option(*s), c.max_score)),
            );
            let weighted = weighted_percentage(
                components
                    .iter()
                    .zip(&cells)
                    .filter(|(c, _)| c.kind == ComponentKind::RubricItem)
                    .map(|(c, s)| {
                        (ScoreState::from_option(*s), c.max_score, c.weight.unwrap_or(0.0))
                    }),
            );
            SheetRow {
                student_id,
                name,
                status,
                scores: cells,
                standing,
                weighted_percentage: weighted,
            }
        })
        .collect();

    Ok(GradeSheet {
        course_id: course.id,
        course_code: course.code,
        course_name: course.name,
        components: components
            .into_iter()
            .map(|c| SheetComponent {
                id: c.id,
                title: c.title,
                kind: c.kind,
                max_score: c.max_score,
                weight: c.weight,
                due_date: c.due_date,
            })
            .collect(),
        students: rows,
    })
}

pub fn grade_sheet(conn: &Connection, actor: &Actor, course_id: &str) -> AppResult<GradeSheet> {
    require_owner_or_management(conn, course_id, actor)?;
    compute_grade_sheet(conn, course_id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStanding {
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub status: EnrollmentStatus,
    pub components: Vec<SheetComponent>,
    pub scores: Vec<Option<f64>>,
    #[serde(flatten)]
    pub standing: Standing,
    pub weighted_percentage: Option<f64>,
}

/// The student's own row from every grade sheet they appear on.
pub fn student_grades(
    conn: &Connection,
    actor: &Actor,
    student_id: &str,
) -> AppResult<Vec<CourseStanding>> {
    require_self_or_management(actor, student_id)?;
    crate::identity::require_student(conn, student_id)?;

    let mut stmt = conn.prepare(
        "SELECT e.course_id FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         WHERE e.student_id = ? AND e.status != 'dropped'
         ORDER BY c.code",
    )?;
    let course_ids: Vec<String> = stmt
        .query_map([student_id], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut out = Vec::with_capacity(course_ids.len());
    for course_id in course_ids {
        let sheet = compute_grade_sheet(conn, &course_id)?;
        let Some(row) = sheet.students.into_iter().find(|r| r.student_id == student_id) else {
            continue;
        };
        out.push(CourseStanding {
            course_id: sheet.course_id,
            course_code: sheet.course_code,
            course_name: sheet.course_name,
            status: row.status,
            components: sheet.components,
            scores: row.scores,
            standing: row.standing,
            weighted_percentage: row.weighted_percentage,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct ScoreWrite {
    pub student_id: String,
    pub component_id: String,
    pub score: f64,
    pub feedback: Option<String>,
    /// When present the write only lands if the row is still at this version.
    pub expected_version: Option<i64>,
}

/// All checks run before the row is touched.
pub fn record_score(conn: &Connection, actor: &Actor, write: &ScoreWrite) -> AppResult<Submission> {
    let comp = component(conn, &write.component_id)?;
    require_owner(conn, &comp.course_id, actor)?;
    if !write.score.is_finite() || write.score < 0.0 || write.score > comp.max_score {
        return Err(AppError::validation(format!(
            "score must be between 0 and {}",
            comp.max_score
        )));
    }
    require_active_enrollment(conn, &write.student_id, &comp.course_id)?;
    let Some(existing) = find_submission(conn, &write.student_id, &write.component_id)? else {
        return Err(AppError::not_found("submission"));
    };
    if let Some(expected) = write.expected_version {
        if expected != existing.version {
            return Err(AppError::conflict(format!(
                "submission is at version {}, not {expected}",
                existing.version
            )));
        }
    }

    let changed = conn.execute(
        "UPDATE submissions
         SET score = ?, feedback = COALESCE(?, feedback), graded_at = ?, graded_by = ?,
             version = version + 1
         WHERE id = ? AND version = ?",
        params![
            write.score,
            write.feedback,
            now_timestamp(),
            actor.profile_id,
            existing.id,
            existing.version
        ],
    )?;
    if changed == 0 {
        return Err(AppError::conflict("submission changed while grading"));
    }

    find_submission(conn, &write.student_id, &write.component_id)?
        .ok_or_else(|| AppError::not_found("submission"))
}

/// Every entry lands or none do; the failing entry's index prefixes the error.
pub fn bulk_record_scores(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
    entries: &[ScoreWrite],
) -> AppResult<usize> {
    require_owner(conn, course_id, actor)?;

    let tx = conn.unchecked_transaction()?;
    for (i, entry) in entries.iter().enumerate() {
        let at = format!("entry {i}");
        let comp = component(&tx, &entry.component_id).map_err(|e| e.prefixed(&at))?;
        if comp.course_id != course_id {
            return Err(
                AppError::validation("component belongs to another course").prefixed(&at),
            );
        }
        record_score(&tx, actor, entry).map_err(|e| e.prefixed(&at))?;
    }
    tx.commit()?;
    tracing::info!(course_id, count = entries.len(), "bulk scores recorded");
    Ok(entries.len())
}
