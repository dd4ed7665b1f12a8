use crate::error::ApiError;
use crate::helper::{identity_helpers, submission_helpers};
use crate::middleware::{AuthenticatedUser, BearerToken};
use crate::models::{PhotoSubmissionRequest, SigninRequest, SignupRequest};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/signup", web::post().to(signup))
        .route("/auth/signin", web::post().to(signin))
        .route("/auth/signout", web::post().to(signout))
        .route("/photos/submit", web::post().to(submit_photo));
}

async fn signup(state: web::Data<AppState>, body: web::Json<SignupRequest>) -> Result<HttpResponse, ApiError> {
    let user = state
        .identity
        .create_user(&body.email, &body.password, body.name.as_deref())?;
    Ok(HttpResponse::Ok().json(json!({ "message": "User created successfully", "user": user })))
}

async fn signin(state: web::Data<AppState>, body: web::Json<SigninRequest>) -> Result<HttpResponse, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    }
    let token = state.identity.sign_in(&body.email, &body.password)?;
    log::info!("User {} signed in", token.user.id);
    Ok(HttpResponse::Ok().json(token))
}

async fn signout(state: web::Data<AppState>, token: BearerToken) -> Result<HttpResponse, ApiError> {
    let user = identity_helpers::authenticate(state.identity.as_ref(), token.0.as_deref())?;
    if let Some(token) = token.0.as_deref() {
        state.identity.sign_out(token)?;
    }
    log::info!("User {} signed out", user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Signed out successfully" })))
}

async fn submit_photo(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: web::Json<PhotoSubmissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let receipt = submission_helpers::submit_photo(
        state.kv.as_ref(),
        state.storage.as_ref(),
        &state.photos_bucket,
        &user.0,
        body.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Photo submitted successfully",
        "submissionId": receipt.submission_id,
        "status": receipt.status,
    })))
}
