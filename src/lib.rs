use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

use crate::config::Config;
use crate::helper::identity_helpers::{Authorizer, IdentityProvider, SqliteIdentityProvider};
use crate::helper::storage_helpers::{LocalObjectStorage, ObjectStorage, StorageError, UrlSigner};
use crate::models::db_operations::kv_db_operations::KvStore;
use crate::setup::db_setup::{self, SetupError};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared handles every request handler works through.
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub authorizer: Arc<dyn Authorizer>,
    pub storage: Arc<dyn ObjectStorage>,
    pub photos_bucket: String,
    pub signed_url_ttl: Duration,
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Everything the HTTP layer needs. The storage handle is also kept concretely
/// for the signed download route.
pub struct Services {
    pub state: AppState,
    pub local_storage: Arc<LocalObjectStorage>,
    pub identity: Arc<SqliteIdentityProvider>,
}

impl Services {
    /// Opens both databases (creating missing tables) and the media buckets.
    pub async fn bootstrap(config: &Config) -> Result<Self, BootstrapError> {
        let kv = db_setup::setup_content_db(&config.content_db_path())?;

        let identity_path = config.identity_db_path();
        if let Some(parent_dir) = identity_path.parent() {
            std::fs::create_dir_all(parent_dir).map_err(SetupError::from)?;
        }
        let manager = SqliteConnectionManager::file(&identity_path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().build(manager)?;
        {
            let mut conn = pool.get()?;
            db_setup::setup_identity_db(&mut conn)?;
        }
        let identity = Arc::new(SqliteIdentityProvider::new(pool, config.token_ttl()));

        let local_storage = Arc::new(LocalObjectStorage::new(
            config.media_path.clone().into(),
            UrlSigner::new(config.url_signing_secret.clone()),
            &config.base_url(),
        ));
        let photos_bucket = config.photos_bucket();
        local_storage.ensure_bucket(&photos_bucket).await?;
        local_storage.ensure_bucket(&config.blog_images_bucket()).await?;

        log::info!(
            "Content store at '{}', identity store at '{}', media under '{}'",
            config.content_db_path().display(),
            identity_path.display(),
            config.media_path
        );

        Ok(Services {
            state: AppState {
                kv: Arc::new(kv),
                identity: identity.clone(),
                authorizer: identity.clone(),
                storage: local_storage.clone(),
                photos_bucket,
                signed_url_ttl: config.signed_url_ttl(),
            },
            local_storage,
            identity,
        })
    }
}

pub mod config;
pub mod error;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
