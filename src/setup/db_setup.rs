use crate::models::db_operations::kv_db_operations::{self, RedbKvStore};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Redb error: {0}")]
    Redb(#[from] kv_db_operations::DbError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Creates the identity tables. Safe to run against an existing database.
pub fn setup_identity_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    log::debug!("Ensuring 'users' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT,
            created_at TEXT NOT NULL,
            last_login_time TEXT
        )",
        [],
    )?;

    log::debug!("Ensuring 'access_tokens' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS access_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::debug!("Ensuring 'user_roles' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS user_roles (
            user_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin')),
            PRIMARY KEY (user_id, role),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;

    tx.commit()?;
    Ok(())
}

/// Opens (or creates) the content store and makes sure its table exists.
pub fn setup_content_db(path: &Path) -> Result<RedbKvStore, SetupError> {
    if let Some(parent_dir) = path.parent() {
        std::fs::create_dir_all(parent_dir)?;
    }
    Ok(RedbKvStore::open(path)?)
}
