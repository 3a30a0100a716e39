use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::directory::{now_utc, StoreError};

const MIN_PASSWORD_LEN: usize = 6;

fn password_digest(email: &str, password: &str) -> String {
    format!("{:x}", Sha256::digest(format!("{}:{}", email, password)))
}

fn auth_failed(message: impl Into<String>) -> StoreError {
    StoreError {
        code: "auth_failed",
        message: message.into(),
    }
}

fn account_exists(conn: &Connection, email: &str) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT 1 FROM auth_accounts WHERE email = ?",
        [email],
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
    .map_err(|e| StoreError {
        code: "db_query_failed",
        message: e.to_string(),
    })
}

pub fn create_account(conn: &Connection, email: &str, password: &str) -> Result<(), StoreError> {
    if email.is_empty() {
        return Err(auth_failed("email must not be empty"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(auth_failed("password must be at least 6 characters"));
    }
    if account_exists(conn, email)? {
        return Err(auth_failed("email already in use"));
    }
    conn.execute(
        "INSERT INTO auth_accounts(email, password_hash, created_at) VALUES(?, ?, ?)",
        (email, password_digest(email, password), now_utc()),
    )
    .map_err(|e| StoreError {
        code: "db_insert_failed",
        message: e.to_string(),
    })?;
    Ok(())
}

/// Checks the stored digest. An unknown email and a wrong password produce
/// the same failure so sign-in does not leak which accounts exist.
pub fn verify_credentials(
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<(), StoreError> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT password_hash FROM auth_accounts WHERE email = ?",
            [email],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| StoreError {
            code: "db_query_failed",
            message: e.to_string(),
        })?;
    match stored {
        Some(hash) if hash == password_digest(email, password) => Ok(()),
        _ => Err(auth_failed("invalid email or password")),
    }
}

/// Compensating rollback for account creation when a follow-up profile
/// write fails.
pub fn delete_account(conn: &Connection, email: &str) -> Result<bool, StoreError> {
    let changed = conn
        .execute("DELETE FROM auth_accounts WHERE email = ?", [email])
        .map_err(|e| StoreError {
            code: "db_delete_failed",
            message: e.to_string(),
        })?;
    Ok(changed > 0)
}
