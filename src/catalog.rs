use crate::courses::{require_owner, require_owner_or_management};
use crate::db::{new_id, now_timestamp};
use crate::enrollment::require_course_reader;
use crate::error::{AppError, AppResult};
use crate::identity::Actor;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Assignment,
    Quiz,
    RubricItem,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Assignment => "assignment",
            ComponentKind::Quiz => "quiz",
            ComponentKind::RubricItem => "rubric_item",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "assignment" => Some(ComponentKind::Assignment),
            "quiz" => Some(ComponentKind::Quiz),
            "rubric_item" => Some(ComponentKind::RubricItem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub course_id: String,
    pub kind: ComponentKind,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub max_score: f64,
    pub weight: Option<f64>,
    pub duration_minutes: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewComponent {
    pub kind: ComponentKind,
    pub title: String,
    pub description: Option<String>,
    pub max_score: f64,
    pub weight: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub max_score: Option<f64>,
    pub weight: Option<f64>,
    pub due_date: Option<Option<NaiveDate>>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewOption {
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub text: String,
    pub points: f64,
    pub options: Vec<NewOption>,
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub description: Option<String>,
    pub max_score: f64,
    pub due_date: Option<NaiveDate>,
    pub duration_minutes: i64,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub text: String,
    pub points: f64,
    pub options: Vec<QuizOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(flatten)]
    pub component: Component,
    pub questions: Vec<QuizQuestion>,
}

const COMPONENT_COLUMNS: &str = "id, course_id, kind, title, description, due_date, max_score,
        weight, duration_minutes, created_at";

/// Undated components last; ties keep creation order.
const COMPONENT_ORDER: &str = "due_date IS NULL, due_date, rowid";

fn component_from_row(r: &Row<'_>) -> rusqlite::Result<Component> {
    let kind: String = r.get(2)?;
    Ok(Component {
        id: r.get(0)?,
        course_id: r.get(1)?,
        kind: ComponentKind::parse(&kind).unwrap_or(ComponentKind::Assignment),
        title: r.get(3)?,
        description: r.get(4)?,
        due_date: r.get(5)?,
        max_score: r.get(6)?,
        weight: r.get(7)?,
        duration_minutes: r.get(8)?,
        created_at: r.get(9)?,
    })
}

fn validate_shape(
    kind: ComponentKind,
    title: &str,
    max_score: f64,
    weight: Option<f64>,
    duration_minutes: Option<i64>,
) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err(AppError::validation("maxScore must be greater than 0"));
    }
    if kind == ComponentKind::RubricItem {
        match weight {
            Some(w) if w.is_finite() && w > 0.0 => {}
            Some(_) => return Err(AppError::validation("weight must be greater than 0")),
            None => return Err(AppError::validation("rubric items require a weight")),
        }
    }
    if let Some(d) = duration_minutes {
        if d < 1 {
            return Err(AppError::validation("durationMinutes must be at least 1"));
        }
    }
    Ok(())
}

pub fn component(conn: &Connection, component_id: &str) -> AppResult<Component> {
    let sql = format!(
        "SELECT {COMPONENT_COLUMNS} FROM assessment_components WHERE id = ?"
    );
    conn.query_row(&sql, [component_id], component_from_row)
        .optional()?
        .ok_or_else(|| AppError::not_found("component"))
}

/// Components of a course in grade-sheet column order.
pub fn course_components(conn: &Connection, course_id: &str) -> AppResult<Vec<Component>> {
    let sql = format!(
        "SELECT {COMPONENT_COLUMNS} FROM assessment_components
         WHERE course_id = ? ORDER BY {COMPONENT_ORDER}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([course_id], component_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

fn insert_component(conn: &Connection, course_id: &str, new: &NewComponent) -> AppResult<String> {
    let id = new_id();
    let weight = match new.kind {
        ComponentKind::RubricItem => new.weight,
        _ => None,
    };
    conn.execute(
        "INSERT INTO assessment_components(
            id, course_id, kind, title, description, due_date, max_score,
            weight, duration_minutes, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            course_id,
            new.kind.as_str(),
            new.title.trim(),
            new.description,
            new.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            new.max_score,
            weight,
            new.duration_minutes,
            now_timestamp()
        ],
    )?;
    Ok(id)
}

pub fn define_component(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
    new: &NewComponent,
) -> AppResult<Component> {
    require_owner(conn, course_id, actor)?;
    validate_shape(
        new.kind,
        &new.title,
        new.max_score,
        new.weight,
        new.duration_minutes,
    )?;
    let id = insert_component(conn, course_id, new)?;
    component(conn, &id)
}

pub fn list_components(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
) -> AppResult<Vec<Component>> {
    require_course_reader(conn, course_id, actor)?;
    course_components(conn, course_id)
}

/// Existing scores are left as they are; aggregation reads the new max score.
pub fn update_component(
    conn: &Connection,
    actor: &Actor,
    component_id: &str,
    patch: &ComponentPatch,
) -> AppResult<Component> {
    let current = component(conn, component_id)?;
    require_owner(conn, &current.course_id, actor)?;

    let title = patch.title.clone().unwrap_or(current.title);
    let description = patch.description.clone().unwrap_or(current.description);
    let max_score = patch.max_score.unwrap_or(current.max_score);
    let weight = match current.kind {
        ComponentKind::RubricItem => patch.weight.or(current.weight),
        _ => None,
    };
    let duration = patch.duration_minutes.or(current.duration_minutes);
    let due_date = match &patch.due_date {
        Some(d) => d.map(|d| d.format("%Y-%m-%d").to_string()),
        None => current.due_date,
    };
    validate_shape(current.kind, &title, max_score, weight, duration)?;

    conn.execute(
        "UPDATE assessment_components
         SET title = ?, description = ?, due_date = ?, max_score = ?, weight = ?,
             duration_minutes = ?
         WHERE id = ?",
        params![
            title.trim(),
            description,
            due_date,
            max_score,
            weight,
            duration,
            component_id
        ],
    )?;
    component(conn, component_id)
}

pub fn delete_component(conn: &Connection, actor: &Actor, component_id: &str) -> AppResult<()> {
    let current = component(conn, component_id)?;
    require_owner(conn, &current.course_id, actor)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM submissions WHERE component_id = ?",
        [component_id],
    )?;
    tx.execute(
        "DELETE FROM quiz_options WHERE question_id IN
            (SELECT id FROM quiz_questions WHERE component_id = ?)",
        [component_id],
    )?;
    tx.execute(
        "DELETE FROM quiz_questions WHERE component_id = ?",
        [component_id],
    )?;
    tx.execute(
        "DELETE FROM assessment_components WHERE id = ?",
        [component_id],
    )?;
    tx.commit()?;
    Ok(())
}

fn validate_quiz(quiz: &NewQuiz) -> AppResult<()> {
    validate_shape(
        ComponentKind::Quiz,
        &quiz.title,
        quiz.max_score,
        None,
        Some(quiz.duration_minutes),
    )?;
    if quiz.questions.is_empty() {
        return Err(AppError::validation("a quiz needs at least one question"));
    }
    let mut total_points = 0.0;
    for (i, q) in quiz.questions.iter().enumerate() {
        let at = |m: &str| AppError::validation(format!("question {i}: {m}"));
        if q.text.trim().is_empty() {
            return Err(at("text must not be empty"));
        }
        if !q.points.is_finite() || q.points <= 0.0 {
            return Err(at("points must be greater than 0"));
        }
        if q.options.len() < 2 {
            return Err(at("at least two options are required"));
        }
        if !q.options.iter().any(|o| o.correct) {
            return Err(at("at least one option must be correct"));
        }
        if q.options.iter().any(|o| o.text.trim().is_empty()) {
            return Err(at("option text must not be empty"));
        }
        total_points += q.points;
    }
    if total_points > quiz.max_score + 1e-9 {
        return Err(AppError::validation(format!(
            "question points ({total_points}) exceed maxScore ({})",
            quiz.max_score
        )));
    }
    Ok(())
}

/// Component, questions and options commit together.
pub fn create_quiz(
    conn: &Connection,
    actor: &Actor,
    course_id: &str,
    quiz: &NewQuiz,
) -> AppResult<Quiz> {
    require_owner(conn, course_id, actor)?;
    validate_quiz(quiz)?;

    let tx = conn.unchecked_transaction()?;
    let component_id = insert_component(
        &tx,
        course_id,
        &NewComponent {
            kind: ComponentKind::Quiz,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            max_score: quiz.max_score,
            weight: None,
            due_date: quiz.due_date,
            duration_minutes: Some(quiz.duration_minutes),
        },
    )?;
    for (qi, q) in quiz.questions.iter().enumerate() {
        let question_id = new_id();
        tx.execute(
            "INSERT INTO quiz_questions(id, component_id, position, text, points)
             VALUES(?, ?, ?, ?, ?)",
            params![question_id, component_id, qi as i64, q.text.trim(), q.points],
        )?;
        for (oi, o) in q.options.iter().enumerate() {
            tx.execute(
                "INSERT INTO quiz_options(id, question_id, position, text, is_correct)
                 VALUES(?, ?, ?, ?, ?)",
                params![new_id(), question_id, oi as i64, o.text.trim(), o.correct as i64],
            )?;
        }
    }
    tx.commit()?;
    tracing::info!(
        course_id,
        component_id = %component_id,
        questions = quiz.questions.len(),
        "quiz created"
    );

    load_quiz(conn, &component_id, true)
}

fn load_quiz(conn: &Connection, component_id: &str, reveal_answers: bool) -> AppResult<Quiz> {
    let component = component(conn, component_id)?;
    if component.kind != ComponentKind::Quiz {
        return Err(AppError::validation("component is not a quiz"));
    }

    let mut q_stmt = conn.prepare(
        "SELECT id, text, points FROM quiz_questions WHERE component_id = ? ORDER BY position",
    )?;
    let questions: Vec<(String, String, f64)> = q_stmt
        .query_map([component_id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut o_stmt = conn.prepare(
        "SELECT id, text, is_correct FROM quiz_options WHERE question_id = ? ORDER BY position",
    )?;
    let mut out = Vec::with_capacity(questions.len());
    for (id, text, points) in questions {
        let options = o_stmt
            .query_map([&id], |r| {
                let correct: i64 = r.get(2)?;
                Ok(QuizOption {
                    id: r.get(0)?,
                    text: r.get(1)?,
                    correct: reveal_answers.then_some(correct != 0),
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        out.push(QuizQuestion {
            id,
            text,
            points,
            options,
        });
    }
    Ok(Quiz {
        component,
        questions: out,
    })
}

/// Correct flags are only shown to the course teacher and management.
pub fn get_quiz(conn: &Connection, actor: &Actor, component_id: &str) -> AppResult<Quiz> {
    let c = component(conn, component_id)?;
    require_course_reader(conn, &c.course_id, actor)?;
    let reveal = require_owner_or_management(conn, &c.course_id, actor).is_ok();
    load_quiz(conn, component_id, reveal)
}
