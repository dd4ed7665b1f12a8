use crate::error::ApiError;
use crate::models::db_operations::users_db_operations::{self, ADMIN_ROLE};
use crate::models::{AccessToken, Identity};
use crate::DbPool;
use chrono::{Duration, Utc};
use rand::RngCore;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found: {0}")]
    UnknownUser(String),
}

/// Issues and resolves bearer tokens for site users.
pub trait IdentityProvider: Send + Sync {
    fn create_user(&self, email: &str, password: &str, name: Option<&str>) -> Result<Identity, IdentityError>;

    fn sign_in(&self, email: &str, password: &str) -> Result<AccessToken, IdentityError>;

    /// `None` for unknown or expired tokens.
    fn resolve_token(&self, token: &str) -> Result<Option<Identity>, IdentityError>;

    fn sign_out(&self, token: &str) -> Result<(), IdentityError>;
}

/// Capability check for administrative actions.
pub trait Authorizer: Send + Sync {
    fn is_admin(&self, user_id: &str) -> Result<bool, IdentityError>;
}

pub struct SqliteIdentityProvider {
    pool: DbPool,
    token_ttl: Duration,
}

impl SqliteIdentityProvider {
    pub fn new(pool: DbPool, token_ttl: Duration) -> Self {
        Self { pool, token_ttl }
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, IdentityError> {
        self.pool.get().map_err(IdentityError::Pool)
    }

    pub fn grant_admin(&self, email: &str) -> Result<Identity, IdentityError> {
        let conn = self.get_conn()?;
        let email = normalize_email(email);
        let user = users_db_operations::read_user_by_email(&conn, &email)?
            .ok_or_else(|| IdentityError::UnknownUser(email.clone()))?;
        users_db_operations::grant_role(&conn, &user.id, ADMIN_ROLE)?;
        Ok(user)
    }

    pub fn revoke_admin(&self, email: &str) -> Result<bool, IdentityError> {
        let conn = self.get_conn()?;
        let email = normalize_email(email);
        let user = users_db_operations::read_user_by_email(&conn, &email)?
            .ok_or_else(|| IdentityError::UnknownUser(email.clone()))?;
        Ok(users_db_operations::revoke_role(&conn, &user.id, ADMIN_ROLE)? > 0)
    }

    pub fn list_admins(&self) -> Result<Vec<Identity>, IdentityError> {
        let conn = self.get_conn()?;
        Ok(users_db_operations::list_users_with_role(&conn, ADMIN_ROLE)?)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl IdentityProvider for SqliteIdentityProvider {
    fn create_user(&self, email: &str, password: &str, name: Option<&str>) -> Result<Identity, IdentityError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(IdentityError::InvalidInput("A valid email address is required".to_string()));
        }
        if password.chars().count() < 6 {
            return Err(IdentityError::InvalidInput(
                "Password should be at least 6 characters".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        if users_db_operations::read_user_by_email(&conn, &email)?.is_some() {
            return Err(IdentityError::EmailTaken);
        }

        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let id = Uuid::new_v4().to_string();
        match users_db_operations::create_user(&conn, &id, &email, password, name) {
            Ok(()) => {}
            // Lost a race with a concurrent signup for the same address.
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                return Err(IdentityError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        }
        log::info!("Created user {} ({})", id, email);

        Ok(Identity {
            id,
            email,
            name: name.map(str::to_string),
        })
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<AccessToken, IdentityError> {
        let conn = self.get_conn()?;
        let user = users_db_operations::verify_credentials(&conn, &normalize_email(email), password)
            .ok_or(IdentityError::InvalidCredentials)?;

        let now = Utc::now();
        users_db_operations::delete_expired_tokens(&conn, now)?;

        let token = generate_token();
        let expires_at = now + self.token_ttl;
        users_db_operations::insert_access_token(&conn, &token, &user.id, expires_at)?;
        if let Err(e) = users_db_operations::update_last_login_time(&conn, &user.id) {
            log::warn!("Could not record last login for {}: {}", user.id, e);
        }

        Ok(AccessToken {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_at,
            user,
        })
    }

    fn resolve_token(&self, token: &str) -> Result<Option<Identity>, IdentityError> {
        let conn = self.get_conn()?;
        Ok(users_db_operations::read_identity_by_token(&conn, token, Utc::now())?)
    }

    fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let conn = self.get_conn()?;
        users_db_operations::delete_access_token(&conn, token)?;
        Ok(())
    }
}

impl Authorizer for SqliteIdentityProvider {
    fn is_admin(&self, user_id: &str) -> Result<bool, IdentityError> {
        let conn = self.get_conn()?;
        Ok(users_db_operations::has_role(&conn, user_id, ADMIN_ROLE)?)
    }
}

/// Resolves a bearer token to a user. Missing, unknown and expired tokens are all `Unauthorized`.
pub fn authenticate(identity: &dyn IdentityProvider, token: Option<&str>) -> Result<Identity, ApiError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;
    identity
        .resolve_token(token)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;
    use r2d2_sqlite::SqliteConnectionManager;
    use tempfile::TempDir;

    fn provider() -> (TempDir, SqliteIdentityProvider) {
        let dir = tempfile::tempdir().unwrap();
        let manager = SqliteConnectionManager::file(dir.path().join("identity.db"));
        let pool = r2d2::Pool::builder().max_size(2).build(manager).unwrap();
        db_setup::setup_identity_db(&mut pool.get().unwrap()).unwrap();
        (dir, SqliteIdentityProvider::new(pool, Duration::hours(1)))
    }

    #[test]
    fn signup_then_signin_resolves_same_identity() {
        let (_dir, idp) = provider();
        let created = idp.create_user(" Ranger@Haven.org ", "trail-mix", Some("Ranger")).unwrap();
        assert_eq!(created.email, "ranger@haven.org");

        let token = idp.sign_in("ranger@haven.org", "trail-mix").unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.access_token.len(), 64);

        let resolved = idp.resolve_token(&token.access_token).unwrap().unwrap();
        assert_eq!(resolved, created);
    }

    #[test]
    fn signup_rejects_bad_input_and_duplicates() {
        let (_dir, idp) = provider();
        assert!(matches!(idp.create_user("not-an-email", "password", None), Err(IdentityError::InvalidInput(_))));
        assert!(matches!(idp.create_user("a@b.com", "123", None), Err(IdentityError::InvalidInput(_))));

        idp.create_user("a@b.com", "password", None).unwrap();
        assert!(matches!(idp.create_user("A@B.com", "password", None), Err(IdentityError::EmailTaken)));
    }

    #[test]
    fn signed_out_token_no_longer_resolves() {
        let (_dir, idp) = provider();
        idp.create_user("a@b.com", "password", None).unwrap();
        let token = idp.sign_in("a@b.com", "password").unwrap();

        idp.sign_out(&token.access_token).unwrap();
        assert!(idp.resolve_token(&token.access_token).unwrap().is_none());
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let (_dir, idp) = provider();
        idp.create_user("a@b.com", "password", None).unwrap();
        assert!(matches!(idp.sign_in("a@b.com", "nope"), Err(IdentityError::InvalidCredentials)));
    }

    #[test]
    fn admin_status_comes_from_role_table_not_email() {
        let (_dir, idp) = provider();
        let lookalike = idp.create_user("admin@haven.org", "password", None).unwrap();
        let curator = idp.create_user("curator@haven.org", "password", None).unwrap();
        idp.grant_admin("curator@haven.org").unwrap();

        assert!(!idp.is_admin(&lookalike.id).unwrap());
        assert!(idp.is_admin(&curator.id).unwrap());
        assert_eq!(idp.list_admins().unwrap(), vec![curator.clone()]);

        assert!(idp.revoke_admin("curator@haven.org").unwrap());
        assert!(!idp.is_admin(&curator.id).unwrap());
        assert!(matches!(idp.grant_admin("ghost@haven.org"), Err(IdentityError::UnknownUser(_))));
    }

    #[test]
    fn authenticate_requires_a_known_token() {
        let (_dir, idp) = provider();
        assert!(matches!(authenticate(&idp, None), Err(ApiError::Unauthorized(_))));
        assert!(matches!(authenticate(&idp, Some("bogus")), Err(ApiError::Unauthorized(_))));

        idp.create_user("a@b.com", "password", None).unwrap();
        let token = idp.sign_in("a@b.com", "password").unwrap();
        assert_eq!(authenticate(&idp, Some(&token.access_token)).unwrap().email, "a@b.com");
    }
}
