use crate::error::ApiError;
use crate::helper::storage_helpers::{is_image_type, LocalObjectStorage};
use actix_files::NamedFile;
use actix_web::http::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct SignedQuery {
    exp: Option<i64>,
    sig: Option<String>,
}

pub fn config_storage(cfg: &mut web::ServiceConfig) {
    cfg.route("/storage/{bucket}/{key}", web::get().to(get_object));
}

async fn get_object(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    query: web::Query<SignedQuery>,
    storage: web::Data<LocalObjectStorage>,
) -> Result<HttpResponse, ApiError> {
    let (bucket, key) = path.into_inner();
    let (exp, sig) = match (query.exp, query.sig.as_deref()) {
        (Some(exp), Some(sig)) => (exp, sig),
        _ => return Err(ApiError::Forbidden("Missing signature".to_string())),
    };

    let (file_path, content_type) = storage.open_signed(&bucket, &key, exp, sig).await?;
    let file = NamedFile::open_async(&file_path).await.map_err(|e| {
        log::warn!("Could not open {}: {}", file_path.display(), e);
        ApiError::NotFound("Object not found".to_string())
    })?;

    let mut response = file.into_response(&req);
    let headers = response.headers_mut();
    match HeaderValue::from_str(&content_type) {
        Ok(value) if is_image_type(&content_type) => {
            headers.insert(CONTENT_TYPE, value);
        }
        // Anything that is not a raster image is only ever offered as a download.
        _ => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
            headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
        }
    }
    Ok(response)
}
