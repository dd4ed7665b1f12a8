use crate::helper::storage_helpers::ObjectStorage;
use crate::models::db_operations::kv_db_operations::{read_records, DbError, KvStore};
use crate::models::{
    BlogPost, GalleryPhoto, PhotoSubmission, Submission, SubmissionStatus, TestimonialSubmission, BLOG_PREFIX,
    PHOTO_PREFIX, TESTIMONIAL_PREFIX,
};
use futures_util::future::join_all;
use std::time::Duration;

/// Submissions under `prefix` with the given status, newest first.
fn fetch_submissions_with_status(
    kv: &dyn KvStore,
    prefix: &str,
    status: SubmissionStatus,
) -> Result<Vec<Submission>, DbError> {
    let mut submissions: Vec<Submission> = read_records::<Submission>(kv, prefix)?
        .into_iter()
        .filter(|submission| submission.status() == status)
        .collect();
    submissions.sort_by_key(|submission| std::cmp::Reverse(submission.created_at()));
    Ok(submissions)
}

pub fn fetch_photos_with_status(kv: &dyn KvStore, status: SubmissionStatus) -> Result<Vec<PhotoSubmission>, DbError> {
    Ok(fetch_submissions_with_status(kv, PHOTO_PREFIX, status)?
        .into_iter()
        .filter_map(|submission| match submission {
            Submission::Photo(photo) => Some(photo),
            _ => None,
        })
        .collect())
}

pub fn fetch_testimonials_with_status(
    kv: &dyn KvStore,
    status: SubmissionStatus,
) -> Result<Vec<TestimonialSubmission>, DbError> {
    Ok(fetch_submissions_with_status(kv, TESTIMONIAL_PREFIX, status)?
        .into_iter()
        .filter_map(|submission| match submission {
            Submission::Testimonial(t) => Some(t),
            _ => None,
        })
        .collect())
}

/// Approved photos, optionally narrowed to one category (`all` means no filter),
/// each paired with a signed URL. A photo whose URL cannot be signed gets an empty one.
pub async fn list_gallery_photos(
    kv: &dyn KvStore,
    storage: &dyn ObjectStorage,
    bucket: &str,
    category: Option<&str>,
    url_ttl: Duration,
) -> Result<Vec<GalleryPhoto>, DbError> {
    let category = category.map(str::trim).filter(|c| !c.is_empty() && *c != "all");

    let photos: Vec<PhotoSubmission> = fetch_photos_with_status(kv, SubmissionStatus::Approved)?
        .into_iter()
        .filter(|photo| category.map_or(true, |c| photo.category == c))
        .collect();

    let signed = photos.into_iter().map(|photo| async move {
        let image_url = match storage.create_signed_url(bucket, &photo.file_name, url_ttl).await {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Could not sign URL for photo {}: {}", photo.id, e);
                String::new()
            }
        };
        GalleryPhoto { photo, image_url }
    });

    Ok(join_all(signed).await)
}

pub fn list_testimonials(kv: &dyn KvStore) -> Result<Vec<TestimonialSubmission>, DbError> {
    fetch_testimonials_with_status(kv, SubmissionStatus::Approved)
}

pub fn list_blog_posts(kv: &dyn KvStore) -> Result<Vec<BlogPost>, DbError> {
    let mut posts: Vec<BlogPost> = read_records(kv, BLOG_PREFIX)?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}
