use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Management,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Management => "management",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "management" => Some(Role::Management),
            _ => None,
        }
    }

    fn profile_table(self) -> &'static str {
        match self {
            Role::Student => "students",
            Role::Teacher => "teachers",
            Role::Management => "management",
        }
    }

    /// The role-specific profile column.
    fn extra_column(self) -> &'static str {
        match self {
            Role::Student => "roll_number",
            Role::Teacher => "department",
            Role::Management => "phone_number",
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub account_id: String,
    pub role: Role,
    pub profile_id: String,
}

impl Actor {
    pub fn require(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "role {} may not perform this action",
                self.role.as_str()
            )))
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Argon2id PHC string; the salt travels inside it.
pub fn hash_credential(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash credential: {e}")))
}

pub fn verify_credential(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub role: Option<Role>,
    pub domain_id: String,
    pub password: String,
    pub name: String,
    pub email: Option<String>,
    /// Roll number, department or phone number depending on the role.
    pub extra: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreated {
    pub account_id: String,
    pub profile_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub account_id: String,
    pub profile_id: String,
    pub domain_id: String,
    pub role: Role,
    pub name: String,
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub account_id: String,
    pub domain_id: String,
    pub role: Role,
    pub name: String,
    pub email: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub extra: Option<String>,
}

pub fn validate_email(email: &str) -> AppResult<()> {
    let bad = || AppError::validation(format!("malformed email: {email}"));
    let (local, domain) = email.split_once('@').ok_or_else(bad)?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(bad());
    }
    Ok(())
}

fn validate_new_account(new: &NewAccount) -> AppResult<Role> {
    let role = new
        .role
        .ok_or_else(|| AppError::validation("role must be student, teacher or management"))?;
    if new.domain_id.trim().is_empty() {
        return Err(AppError::validation("domainId must not be empty"));
    }
    if new.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if new.name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if let Some(email) = new.email.as_deref() {
        validate_email(email)?;
    }
    Ok(role)
}

/// Account and profile rows go in together or not at all.
pub(crate) fn insert_account(conn: &Connection, new: &NewAccount) -> AppResult<AccountCreated> {
    let role = validate_new_account(new)?;
    let domain_id = new.domain_id.trim();

    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM accounts WHERE domain_id = ?",
            [domain_id],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(AppError::conflict(format!(
            "domain id {domain_id} is already registered"
        )));
    }

    let account_id = new_id();
    let profile_id = new_id();
    let hash = hash_credential(&new.password)?;
    let now = now_timestamp();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO accounts(id, domain_id, credential_hash, role, created_at)
         VALUES(?, ?, ?, ?, ?)",
        params![account_id, domain_id, hash, role.as_str(), now],
    )?;
    let sql = format!(
        "INSERT INTO {}(id, account_id, name, email, {}, updated_at) VALUES(?, ?, ?, ?, ?, ?)",
        role.profile_table(),
        role.extra_column()
    );
    tx.execute(
        &sql,
        params![
            profile_id,
            account_id,
            new.name.trim(),
            new.email.as_deref().map(str::trim),
            new.extra.as_deref(),
            now
        ],
    )?;
    tx.commit()?;

    Ok(AccountCreated {
        account_id,
        profile_id,
        role,
    })
}

pub fn create_account(
    conn: &Connection,
    actor: &Actor,
    new: &NewAccount,
) -> AppResult<AccountCreated> {
    actor.require(&[Role::Management])?;
    let created = insert_account(conn, new)?;
    tracing::info!(
        account_id = %created.account_id,
        role = created.role.as_str(),
        "account created"
    );
    Ok(created)
}

const LOGIN_FAILED: &str = "invalid domain id or password";

pub fn login(conn: &Connection, domain_id: &str, password: &str) -> AppResult<Actor> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT id, credential_hash FROM accounts WHERE domain_id = ?",
            [domain_id.trim()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((account_id, stored_hash)) = row else {
        return Err(AppError::forbidden(LOGIN_FAILED));
    };
    if !verify_credential(password, &stored_hash) {
        return Err(AppError::forbidden(LOGIN_FAILED));
    }
    resolve_actor(conn, &account_id)
}

pub fn resolve_actor(conn: &Connection, account_id: &str) -> AppResult<Actor> {
    let role: Option<String> = conn
        .query_row(
            "SELECT role FROM accounts WHERE id = ?",
            [account_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(role) = role.as_deref().and_then(Role::parse) else {
        return Err(AppError::forbidden("unknown actor"));
    };
    let sql = format!(
        "SELECT id FROM {} WHERE account_id = ?",
        role.profile_table()
    );
    let profile_id: Option<String> = conn
        .query_row(&sql, [account_id], |r| r.get(0))
        .optional()?;
    let Some(profile_id) = profile_id else {
        return Err(AppError::forbidden("actor has no profile"));
    };
    Ok(Actor {
        account_id: account_id.to_string(),
        role,
        profile_id,
    })
}

pub fn get_profile(conn: &Connection, account_id: &str) -> AppResult<Profile> {
    let account: Option<(String, String, String)> = conn
        .query_row(
            "SELECT domain_id, role, created_at FROM accounts WHERE id = ?",
            [account_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((domain_id, role, created_at)) = account else {
        return Err(AppError::not_found("account"));
    };
    let role = Role::parse(&role).ok_or_else(|| AppError::not_found("account"))?;
    let sql = format!(
        "SELECT id, name, email, {} FROM {} WHERE account_id = ?",
        role.extra_column(),
        role.profile_table()
    );
    let profile: Option<(String, String, Option<String>, Option<String>)> = conn
        .query_row(&sql, [account_id], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
        })
        .optional()?;
    let Some((profile_id, name, email, extra)) = profile else {
        return Err(AppError::not_found("profile"));
    };

    let mut out = Profile {
        account_id: account_id.to_string(),
        profile_id,
        domain_id,
        role,
        name,
        email,
        roll_number: None,
        department: None,
        phone_number: None,
        created_at,
    };
    match role {
        Role::Student => out.roll_number = extra,
        Role::Teacher => out.department = extra,
        Role::Management => out.phone_number = extra,
    }
    Ok(out)
}

fn apply_profile_patch(
    conn: &Connection,
    account_id: &str,
    patch: &ProfilePatch,
) -> AppResult<Profile> {
    let current = get_profile(conn, account_id)?;
    if let Some(name) = patch.name.as_deref() {
        if name.trim().is_empty() {
            return Err(AppError::validation("name must not be empty"));
        }
    }
    if let Some(email) = patch.email.as_deref() {
        validate_email(email)?;
    }

    let role = current.role;
    let mut set_parts: Vec<String> = Vec::new();
    let mut bind: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(name) = patch.name.as_deref() {
        set_parts.push("name = ?".into());
        bind.push(name.trim().to_string().into());
    }
    if let Some(email) = patch.email.as_deref() {
        set_parts.push("email = ?".into());
        bind.push(email.trim().to_string().into());
    }
    if let Some(extra) = patch.extra.as_deref() {
        set_parts.push(format!("{} = ?", role.extra_column()));
        bind.push(extra.to_string().into());
    }
    if set_parts.is_empty() {
        return Ok(current);
    }
    set_parts.push("updated_at = ?".into());
    bind.push(now_timestamp().into());
    bind.push(account_id.to_string().into());

    let sql = format!(
        "UPDATE {} SET {} WHERE account_id = ?",
        role.profile_table(),
        set_parts.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(bind))?;
    get_profile(conn, account_id)
}

pub fn update_profile(
    conn: &Connection,
    actor: &Actor,
    patch: &ProfilePatch,
) -> AppResult<Profile> {
    apply_profile_patch(conn, &actor.account_id, patch)
}

/// Management edits another account's profile. The role is never editable.
pub fn update_user(
    conn: &Connection,
    actor: &Actor,
    account_id: &str,
    patch: &ProfilePatch,
) -> AppResult<Profile> {
    actor.require(&[Role::Management])?;
    apply_profile_patch(conn, account_id, patch)
}

pub fn delete_user(_conn: &Connection, actor: &Actor, _account_id: &str) -> AppResult<()> {
    actor.require(&[Role::Management])?;
    Err(AppError::Unimplemented("users.delete".into()))
}

pub fn list_users(conn: &Connection, actor: &Actor) -> AppResult<Vec<UserRow>> {
    actor.require(&[Role::Management])?;
    let mut stmt = conn.prepare(
        "SELECT a.id, a.domain_id, a.role, a.created_at,
                COALESCE(s.name, t.name, m.name, ''),
                COALESCE(s.email, t.email, m.email)
         FROM accounts a
         LEFT JOIN students s ON s.account_id = a.id
         LEFT JOIN teachers t ON t.account_id = a.id
         LEFT JOIN management m ON m.account_id = a.id
         ORDER BY a.created_at DESC, a.rowid DESC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let role: String = r.get(2)?;
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                role,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, Option<String>>(5)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    Ok(rows
        .into_iter()
        .filter_map(|(account_id, domain_id, role, created_at, name, email)| {
            Some(UserRow {
                account_id,
                domain_id,
                role: Role::parse(&role)?,
                name,
                email,
                created_at,
            })
        })
        .collect())
}

pub fn student_exists(conn: &Connection, student_id: &str) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn require_student(conn: &Connection, student_id: &str) -> AppResult<()> {
    if student_exists(conn, student_id)? {
        Ok(())
    } else {
        Err(AppError::not_found("student"))
    }
}

pub fn require_teacher(conn: &Connection, teacher_id: &str) -> AppResult<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM teachers WHERE id = ?",
            [teacher_id],
            |r| r.get(0),
        )
        .optional()?;
    if found.is_some() {
        Ok(())
    } else {
        Err(AppError::not_found("teacher"))
    }
}

/// A student acts on their own records; management acts on anyone's.
pub fn require_self_or_management(actor: &Actor, student_id: &str) -> AppResult<()> {
    match actor.role {
        Role::Management => Ok(()),
        Role::Student if actor.profile_id == student_id => Ok(()),
        _ => Err(AppError::forbidden("not permitted for this student")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::test_helper::{admin, new_student};

    #[test]
    fn credential_hash_is_salted_argon2() {
        let a = hash_credential("secret1").unwrap();
        let b = hash_credential("secret1").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(verify_credential("secret1", &a));
        assert!(verify_credential("secret1", &b));
        assert!(!verify_credential("secret2", &a));
        assert!(!verify_credential("secret1", "not-a-phc-string"));
    }

    #[test]
    fn stored_credential_is_not_the_password() {
        let conn = open_in_memory().unwrap();
        let s = new_student(&conn, &admin(&conn), "Ada");
        let stored: String = conn
            .query_row(
                "SELECT credential_hash FROM accounts WHERE id = ?",
                [&s.account_id],
                |r| r.get(0),
            )
            .unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("password"));
    }

    #[test]
    fn duplicate_domain_id_is_a_conflict() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let new = NewAccount {
            role: Some(Role::Student),
            domain_id: "s-100".into(),
            password: "hunter22".into(),
            name: "Ada".into(),
            email: Some("ada@example.edu".into()),
            extra: Some("R-1".into()),
        };
        create_account(&conn, &admin, &new).unwrap();
        let err = create_account(&conn, &admin, &new).unwrap_err();
        assert_eq!(err.code(), "conflict");

        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn short_password_and_bad_email_are_rejected() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let mut new = NewAccount {
            role: Some(Role::Teacher),
            domain_id: "t-1".into(),
            password: "12345".into(),
            name: "Grace".into(),
            ..Default::default()
        };
        assert_eq!(
            create_account(&conn, &admin, &new).unwrap_err().code(),
            "bad_params"
        );
        new.password = "123456".into();
        new.email = Some("not-an-email".into());
        assert_eq!(
            create_account(&conn, &admin, &new).unwrap_err().code(),
            "bad_params"
        );
        new.email = None;
        assert!(create_account(&conn, &admin, &new).is_ok());
    }

    #[test]
    fn login_does_not_reveal_which_part_failed() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let created = create_account(
            &conn,
            &admin,
            &NewAccount {
                role: Some(Role::Student),
                domain_id: "s-7".into(),
                password: "correct-horse".into(),
                name: "Linus".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let actor = login(&conn, "s-7", "correct-horse").unwrap();
        assert_eq!(actor.account_id, created.account_id);
        assert_eq!(actor.profile_id, created.profile_id);

        let wrong_pw = login(&conn, "s-7", "nope-nope").unwrap_err();
        let unknown = login(&conn, "ghost", "whatever").unwrap_err();
        assert_eq!(wrong_pw.code(), "forbidden");
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[test]
    fn only_management_creates_accounts() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let student = new_student(&conn, &admin, "Mia");
        let err = create_account(
            &conn,
            &student,
            &NewAccount {
                role: Some(Role::Student),
                domain_id: "x".into(),
                password: "password".into(),
                name: "X".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "forbidden");
        let err = delete_user(&conn, &admin, &student.account_id).unwrap_err();
        assert_eq!(err.code(), "not_implemented");
    }

    #[test]
    fn profile_update_touches_role_column() {
        let conn = open_in_memory().unwrap();
        let admin = admin(&conn);
        let student = new_student(&conn, &admin, "Noor");
        let profile = update_profile(
            &conn,
            &student,
            &ProfilePatch {
                name: Some("Noor A.".into()),
                email: None,
                extra: Some("R-42".into()),
            },
        )
        .unwrap();
        assert_eq!(profile.name, "Noor A.");
        assert_eq!(profile.roll_number.as_deref(), Some("R-42"));
        assert!(profile.department.is_none());

        let users = list_users(&conn, &admin).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].account_id, student.account_id);
    }
}
