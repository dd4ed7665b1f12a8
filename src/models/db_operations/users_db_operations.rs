use crate::models::Identity;
use bcrypt::{hash, verify, BcryptError};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension};

pub const ADMIN_ROLE: &str = "admin";

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

// Fixed-width so expiry columns compare correctly as text.
fn token_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn identity_from_row(row: &rusqlite::Row) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
    })
}

pub fn create_user(
    conn: &Connection,
    id: &str,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> Result<(), RusqliteError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (id, email, password_hash, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, email, hashed_password, name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn read_user_by_email(conn: &Connection, email: &str) -> Result<Option<Identity>, RusqliteError> {
    conn.query_row(
        "SELECT id, email, name FROM users WHERE email = ?1",
        [email],
        identity_from_row,
    )
    .optional()
}

pub fn read_user_by_id(conn: &Connection, user_id: &str) -> Result<Option<Identity>, RusqliteError> {
    conn.query_row(
        "SELECT id, email, name FROM users WHERE id = ?1",
        [user_id],
        identity_from_row,
    )
    .optional()
}

pub fn verify_credentials(conn: &Connection, email: &str, password: &str) -> Option<Identity> {
    let res: rusqlite::Result<(String, String, Option<String>, String)> = conn.query_row(
        "SELECT id, email, name, password_hash FROM users WHERE email = ?1",
        [email],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    );

    if let Ok((id, email, name, hash)) = res {
        if verify(password, &hash).unwrap_or(false) {
            return Some(Identity { id, email, name });
        }
    }
    None
}

pub fn update_last_login_time(conn: &Connection, user_id: &str) -> Result<(), RusqliteError> {
    let now = Utc::now().to_rfc3339();
    conn.execute("UPDATE users SET last_login_time = ?1 WHERE id = ?2", params![now, user_id])?;
    Ok(())
}

// --- Access tokens ---

pub fn insert_access_token(
    conn: &Connection,
    token: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO access_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, token_timestamp(expires_at)],
    )?;
    Ok(())
}

/// Resolves a token that has not yet expired at `now`.
pub fn read_identity_by_token(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<Identity>, RusqliteError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM access_tokens WHERE token = ?1",
            [token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((user_id, expires_at)) = row else {
        return Ok(None);
    };

    let expired = DateTime::parse_from_rfc3339(&expires_at)
        .map(|at| at.with_timezone(&Utc) <= now)
        .unwrap_or(true);
    if expired {
        return Ok(None);
    }

    read_user_by_id(conn, &user_id)
}

pub fn delete_access_token(conn: &Connection, token: &str) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM access_tokens WHERE token = ?1", [token])
}

pub fn delete_expired_tokens(conn: &Connection, now: DateTime<Utc>) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM access_tokens WHERE expires_at <= ?1", [token_timestamp(now)])
}

// --- Roles ---

pub fn grant_role(conn: &Connection, user_id: &str, role: &str) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
        params![user_id, role],
    )?;
    Ok(())
}

pub fn revoke_role(conn: &Connection, user_id: &str, role: &str) -> Result<usize, RusqliteError> {
    conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        params![user_id, role],
    )
}

pub fn has_role(conn: &Connection, user_id: &str, role: &str) -> Result<bool, RusqliteError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = ?2)",
        params![user_id, role],
        |row| row.get(0),
    )
}

pub fn list_users_with_role(conn: &Connection, role: &str) -> Result<Vec<Identity>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.name FROM users u
         JOIN user_roles r ON r.user_id = u.id
         WHERE r.role = ?1 ORDER BY u.email",
    )?;
    let rows = stmt.query_map([role], identity_from_row)?;

    let mut users = Vec::new();
    for user in rows {
        users.push(user?);
    }
    Ok(users)
}
