use crate::catalog::{define_component, ComponentKind, NewComponent};
use crate::courses::{create_course, NewCourse};
use crate::identity::{create_account, insert_account, resolve_actor, Actor, NewAccount, Role};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};

static SEQ: AtomicUsize = AtomicUsize::new(0);

fn next_domain_id(prefix: &str) -> String {
    format!("{prefix}-{}", SEQ.fetch_add(1, Ordering::Relaxed))
}

pub fn admin(conn: &Connection) -> Actor {
    let created = insert_account(
        conn,
        &NewAccount {
            role: Some(Role::Management),
            domain_id: next_domain_id("admin"),
            password: "admin-pass".into(),
            name: "Admin".into(),
            ..Default::default()
        },
    )
    .expect("seed admin");
    resolve_actor(conn, &created.account_id).expect("resolve admin")
}

fn new_account(conn: &Connection, admin: &Actor, role: Role, name: &str) -> Actor {
    let created = create_account(
        conn,
        admin,
        &NewAccount {
            role: Some(role),
            domain_id: next_domain_id(role.as_str()),
            password: "password".into(),
            name: name.into(),
            ..Default::default()
        },
    )
    .expect("create account");
    resolve_actor(conn, &created.account_id).expect("resolve actor")
}

pub fn new_student(conn: &Connection, admin: &Actor, name: &str) -> Actor {
    new_account(conn, admin, Role::Student, name)
}

pub fn new_teacher(conn: &Connection, admin: &Actor, name: &str) -> Actor {
    new_account(conn, admin, Role::Teacher, name)
}

pub fn new_course(conn: &Connection, admin: &Actor, code: &str, teacher: Option<&Actor>) -> String {
    create_course(
        conn,
        admin,
        &NewCourse {
            code: code.into(),
            name: format!("{code} course"),
            schedule: None,
            teacher_id: teacher.map(|t| t.profile_id.clone()),
        },
    )
    .expect("create course")
    .id
}

pub fn assignment(
    conn: &Connection,
    teacher: &Actor,
    course_id: &str,
    title: &str,
    max_score: f64,
) -> String {
    define_component(
        conn,
        teacher,
        course_id,
        &NewComponent {
            kind: ComponentKind::Assignment,
            title: title.into(),
            description: None,
            max_score,
            weight: None,
            due_date: None,
            duration_minutes: None,
        },
    )
    .expect("define assignment")
    .id
}
