use crate::helper::identity_helpers::IdentityError;
use crate::helper::storage_helpers::StorageError;
use crate::models::db_operations::kv_db_operations::DbError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to API clients as a status code plus `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Failed to upload photo")]
    UploadFailed,
    #[error("Internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UploadFailed | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        log::error!("Content store error: {}", e);
        ApiError::Internal
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidInput(msg) => ApiError::BadRequest(msg),
            IdentityError::EmailTaken => {
                ApiError::BadRequest("A user with this email address has already been registered".to_string())
            }
            IdentityError::InvalidCredentials => ApiError::Unauthorized("Invalid login credentials".to_string()),
            other => {
                log::error!("Identity provider error: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ApiError::NotFound("Object not found".to_string()),
            StorageError::Signature(msg) => ApiError::Forbidden(msg),
            StorageError::InvalidKey(_) => ApiError::BadRequest("Invalid object key".to_string()),
            other => {
                log::error!("Object storage error: {}", other);
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn error_body_is_json_with_error_field() {
        let resp = ApiError::NotFound("Item not found".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "error": "Item not found" }));
    }

    #[test]
    fn upload_failures_are_server_errors() {
        assert_eq!(ApiError::UploadFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn credential_errors_map_to_unauthorized() {
        let err: ApiError = IdentityError::InvalidCredentials.into();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
