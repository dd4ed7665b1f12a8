use crate::error::ApiError;
use crate::helper::admin_helpers;
use crate::middleware::AdminUser;
use crate::models::{BlogPostRequest, ModerationRequest};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/admin/pending", web::get().to(get_pending))
        .route("/admin/moderate", web::post().to(moderate))
        .route("/blog/posts", web::post().to(create_blog_post));
}

async fn get_pending(_admin: AdminUser, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let pending = admin_helpers::list_pending(state.kv.as_ref())?;
    Ok(HttpResponse::Ok().json(pending))
}

async fn moderate(
    admin: AdminUser,
    state: web::Data<AppState>,
    body: web::Json<ModerationRequest>,
) -> Result<HttpResponse, ApiError> {
    let action = admin_helpers::moderate(state.kv.as_ref(), &admin.0, &body.id, &body.action)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Item {} successfully", action.past_tense())
    })))
}

async fn create_blog_post(
    admin: AdminUser,
    state: web::Data<AppState>,
    body: web::Json<BlogPostRequest>,
) -> Result<HttpResponse, ApiError> {
    let post = admin_helpers::create_blog_post(state.kv.as_ref(), &admin.0, body.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Blog post created successfully", "post": post })))
}
