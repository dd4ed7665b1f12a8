use actix_web::web;

use crate::error::ApiError;

pub mod admin;
pub mod contributor;
pub mod public;
pub mod storage;

/// Mounts the JSON API under `api_prefix` and signed downloads at the root.
pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str) {
    cfg.service(
        web::scope(api_prefix)
            .configure(public::config_api)
            .configure(contributor::config_api)
            .configure(admin::config_api),
    )
    .configure(storage::config_storage);
}

/// JSON body limit, with malformed bodies reported as `{"error": ...}` 400s.
pub fn json_config(limit_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit_bytes)
        .error_handler(|err, _req| {
            log::debug!("Rejected JSON body: {}", err);
            ApiError::BadRequest(format!("Invalid request body: {}", err)).into()
        })
}

/// Query strings that fail to parse get the same `{"error": ...}` 400 as bad bodies.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected query string: {}", err);
        ApiError::BadRequest(format!("Invalid query string: {}", err)).into()
    })
}
