use crate::config::AdminSeed;
use crate::identity::{insert_account, NewAccount, Role};
use anyhow::Context;
use rusqlite::Connection;

/// Seeds the first management account when the workspace has none.
/// Returns whether an account was created.
pub fn ensure_admin(conn: &Connection, seed: &AdminSeed) -> anyhow::Result<bool> {
    let existing: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM accounts WHERE role = 'management'",
            [],
            |r| r.get(0),
        )
        .context("count management accounts")?;
    if existing > 0 {
        tracing::debug!(existing, "management account present, skipping bootstrap");
        return Ok(false);
    }

    let created = insert_account(
        conn,
        &NewAccount {
            role: Some(Role::Management),
            domain_id: seed.domain_id.clone(),
            password: seed.password.clone(),
            name: seed.name.clone(),
            email: None,
            extra: None,
        },
    )
    .context("create bootstrap management account")?;
    tracing::info!(
        domain_id = %seed.domain_id,
        account_id = %created.account_id,
        "bootstrap management account created"
    );
    Ok(true)
}
