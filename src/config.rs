use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_SIGNING_SECRET_LEN: usize = 32;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub api_prefix: String,
    pub bucket_prefix: String,
    pub signed_url_ttl_secs: u64,
    pub token_ttl_hours: i64,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub url_signing_secret: String,
    pub public_base_url: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub max_request_size_mb: usize,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn absolute_path_var(name: &str) -> Result<String, config::ConfigError> {
    let value = required_var(name)?;
    if Path::new(&value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(value)
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = absolute_path_var("DATABASE_PATH")?;
        let media_path = absolute_path_var("MEDIA_PATH")?;

        let url_signing_secret = required_var("URL_SIGNING_SECRET")?;
        if url_signing_secret.len() < MIN_SIGNING_SECRET_LEN {
            return Err(config::ConfigError::Message(format!(
                "FATAL: 'URL_SIGNING_SECRET' must be at least {} characters long.",
                MIN_SIGNING_SECRET_LEN
            )));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let public_base_url = env::var("PUBLIC_BASE_URL").unwrap_or_default();
        if !public_base_url.is_empty() {
            url::Url::parse(&public_base_url).map_err(|e| {
                config::ConfigError::Message(format!("FATAL: 'PUBLIC_BASE_URL' is not a valid URL: {}", e))
            })?;
        }

        let max_request_size_mb = match env::var("MAX_REQUEST_SIZE_MB") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| {
                config::ConfigError::Message(format!(
                    "FATAL: 'MAX_REQUEST_SIZE_MB' must be a whole number, got '{}'.",
                    raw
                ))
            })?,
            Err(_) => 10,
        };

        let builder = config::Config::builder()
            // Base settings (web host/port, prefixes, TTLs).
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("url_signing_secret", url_signing_secret)?
            .set_override("public_base_url", public_base_url)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("max_request_size_mb", max_request_size_mb as u64)?
            .build()?;

        builder.try_deserialize()
    }

    pub fn identity_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("identity").join("identity.db")
    }

    pub fn content_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("content").join("content.redb")
    }

    pub fn photos_bucket(&self) -> String {
        format!("{}-photos", self.bucket_prefix)
    }

    pub fn blog_images_bucket(&self) -> String {
        format!("{}-blog-images", self.bucket_prefix)
    }

    /// Origin used in signed URLs; falls back to the bind address.
    pub fn base_url(&self) -> String {
        if self.public_base_url.is_empty() {
            format!("http://{}:{}", self.web.host, self.web.port)
        } else {
            self.public_base_url.trim_end_matches('/').to_string()
        }
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn json_limit_bytes(&self) -> usize {
        self.max_request_size_mb * 1024 * 1024
    }
}
