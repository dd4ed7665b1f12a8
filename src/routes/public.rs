use crate::error::ApiError;
use crate::helper::{public_helpers, submission_helpers};
use crate::models::TestimonialRequest;
use crate::setup::seed_data;
use crate::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct GalleryQuery {
    category: Option<String>,
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/photos/gallery", web::get().to(get_gallery))
        .route("/blog/posts", web::get().to(get_blog_posts))
        .route("/testimonials", web::get().to(get_testimonials))
        .route("/testimonials", web::post().to(post_testimonial))
        .route("/seed", web::post().to(seed));
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn get_gallery(
    state: web::Data<AppState>,
    query: web::Query<GalleryQuery>,
) -> Result<HttpResponse, ApiError> {
    let photos = public_helpers::list_gallery_photos(
        state.kv.as_ref(),
        state.storage.as_ref(),
        &state.photos_bucket,
        query.category.as_deref(),
        state.signed_url_ttl,
    )
    .await?;
    Ok(HttpResponse::Ok().json(photos))
}

async fn get_blog_posts(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let posts = public_helpers::list_blog_posts(state.kv.as_ref())?;
    Ok(HttpResponse::Ok().json(posts))
}

async fn get_testimonials(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let testimonials = public_helpers::list_testimonials(state.kv.as_ref())?;
    Ok(HttpResponse::Ok().json(testimonials))
}

async fn post_testimonial(
    state: web::Data<AppState>,
    body: web::Json<TestimonialRequest>,
) -> Result<HttpResponse, ApiError> {
    submission_helpers::submit_testimonial(state.kv.as_ref(), body.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Testimonial submitted successfully" })))
}

async fn seed(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    seed_data::seed(state.kv.as_ref())?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Seed data created successfully" })))
}
