use crate::error::ApiError;
use crate::helper::sanitization_helpers::{strip_all_html, strip_optional};
use crate::helper::storage_helpers::{is_image_type, ObjectStorage};
use crate::models::db_operations::kv_db_operations::{write_record, KvStore};
use crate::models::{
    Identity, ModerationState, PhotoSubmission, PhotoSubmissionRequest, Submission, SubmissionReceipt,
    SubmissionStatus, TestimonialRequest, TestimonialSubmission, PHOTO_PREFIX, TESTIMONIAL_PREFIX,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use uuid::Uuid;

const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";
const OPAQUE_TYPE: &str = "application/octet-stream";
const FALLBACK_FILE_NAME: &str = "upload";

pub fn new_record_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

/// Decodes base64 upload data, accepting a bare payload or a `data:<mime>;base64,` URL.
/// Returns the bytes and the content type to store them under. Only `image/*` types are
/// kept; anything else is stored as opaque bytes.
pub fn decode_file_data(file_data: &str) -> Result<(Vec<u8>, String), ApiError> {
    let trimmed = file_data.trim();
    let (content_type, payload) = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| ApiError::BadRequest("Malformed data URL".to_string()))?;
            let mime = header.strip_suffix(";base64").ok_or_else(|| {
                ApiError::BadRequest("Only base64 data URLs are supported".to_string())
            })?;
            let mime = mime.trim().to_ascii_lowercase();
            let content_type = if mime.is_empty() {
                DEFAULT_IMAGE_TYPE.to_string()
            } else if is_image_type(&mime) {
                mime
            } else {
                OPAQUE_TYPE.to_string()
            };
            (content_type, payload)
        }
        None => (DEFAULT_IMAGE_TYPE.to_string(), trimmed),
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ApiError::BadRequest("File data is not valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("File data is required".to_string()));
    }
    Ok((bytes, content_type))
}

/// Final path component of a client file name, restricted to `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned.chars().take(200).collect()
    }
}

pub fn storage_file_name(file_name: &str) -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), sanitize_file_name(file_name))
}

/// Uploads the image, then records the submission as pending.
pub async fn submit_photo(
    kv: &dyn KvStore,
    storage: &dyn ObjectStorage,
    bucket: &str,
    identity: &Identity,
    request: PhotoSubmissionRequest,
) -> Result<SubmissionReceipt, ApiError> {
    let title = strip_all_html(request.title.trim());
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    let (bytes, content_type) = decode_file_data(&request.file_data)?;

    let object_key = storage_file_name(&request.file_name);
    if let Err(e) = storage.upload(bucket, &object_key, bytes, &content_type).await {
        log::error!("Upload of {} to bucket '{}' failed: {}", object_key, bucket, e);
        return Err(ApiError::UploadFailed);
    }

    let photo = PhotoSubmission {
        id: new_record_id(PHOTO_PREFIX),
        user_id: identity.id.clone(),
        user_name: identity.display_name().to_string(),
        title,
        description: strip_optional(request.description.as_deref()),
        location: strip_optional(request.location.as_deref()),
        category: request.category.trim().to_string(),
        file_name: object_key.clone(),
        moderation: ModerationState::pending(Utc::now()),
    };
    let id = photo.id.clone();
    if let Err(e) = write_record(kv, &id, &Submission::Photo(photo)) {
        if let Err(cleanup) = storage.remove(bucket, &object_key).await {
            log::warn!("Could not remove orphaned object {}/{}: {}", bucket, object_key, cleanup);
        }
        return Err(e.into());
    }
    log::info!("Photo submission {} received from {}", id, identity.id);

    Ok(SubmissionReceipt {
        submission_id: id,
        status: SubmissionStatus::Pending,
    })
}

pub fn submit_testimonial(kv: &dyn KvStore, request: TestimonialRequest) -> Result<String, ApiError> {
    let testimonial = TestimonialSubmission {
        id: new_record_id(TESTIMONIAL_PREFIX),
        name: strip_all_html(request.name.trim()),
        role: strip_all_html(request.role.trim()),
        email: request.email.trim().to_string(),
        rating: request.rating,
        text: strip_all_html(request.text.trim()),
        moderation: ModerationState::pending(Utc::now()),
    };
    let id = testimonial.id.clone();
    write_record(kv, &id, &Submission::Testimonial(testimonial))?;
    log::info!("Testimonial {} received", id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::storage_helpers::StorageError;
    use crate::models::db_operations::kv_db_operations::{read_records, CasOutcome, DbError, RedbKvStore};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingStorage {
        uploads: Mutex<Vec<(String, String, String)>>,
        removed: Mutex<Vec<String>>,
        reject: bool,
    }

    #[async_trait]
    impl ObjectStorage for RecordingStorage {
        async fn ensure_bucket(&self, _bucket: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn upload(&self, bucket: &str, key: &str, _data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
            if self.reject {
                return Err(StorageError::AlreadyExists(key.to_string()));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string(), content_type.to_string()));
            Ok(())
        }

        async fn remove(&self, _bucket: &str, key: &str) -> Result<(), StorageError> {
            self.removed.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn create_signed_url(&self, _bucket: &str, key: &str, _ttl: Duration) -> Result<String, StorageError> {
            Ok(format!("signed://{}", key))
        }
    }

    /// Reads work; every write fails.
    struct ReadOnlyKv;

    impl KvStore for ReadOnlyKv {
        fn get(&self, _key: &str) -> Result<Option<Value>, DbError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &Value) -> Result<(), DbError> {
            Err(DbError::SerdeJson(serde_json::from_str::<Value>("{").unwrap_err()))
        }

        fn get_by_prefix(&self, _prefix: &str) -> Result<Vec<Value>, DbError> {
            Ok(Vec::new())
        }

        fn compare_and_set(&self, _key: &str, _expected: &Value, _new: &Value) -> Result<CasOutcome, DbError> {
            Ok(CasOutcome::Missing)
        }
    }

    fn store() -> (TempDir, RedbKvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbKvStore::open(&dir.path().join("content.redb")).unwrap();
        (dir, store)
    }

    fn user() -> Identity {
        Identity { id: "u1".into(), email: "jo@haven.org".into(), name: Some("Jo".into()) }
    }

    fn request(title: &str) -> PhotoSubmissionRequest {
        PhotoSubmissionRequest {
            title: title.to_string(),
            description: Some("<em>Morning</em> light".to_string()),
            category: "flora".to_string(),
            location: None,
            file_data: "data:image/png;base64,aGVsbG8=".to_string(),
            file_name: "../ferns at dawn.png".to_string(),
        }
    }

    #[test]
    fn data_url_mime_becomes_content_type() {
        let (bytes, mime) = decode_file_data("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime, "image/png");

        let (_, mime) = decode_file_data("aGVsbG8=").unwrap();
        assert_eq!(mime, "image/jpeg");

        let (_, mime) = decode_file_data("data:IMAGE/WEBP;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/webp");

        assert!(matches!(decode_file_data("%%%"), Err(ApiError::BadRequest(_))));
        assert!(matches!(decode_file_data(""), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn non_image_data_urls_are_stored_as_opaque_bytes() {
        for data_url in [
            "data:text/html;base64,PHNjcmlwdD4=",
            "data:image/;base64,PHNjcmlwdD4=",
            "data:application/javascript;base64,PHNjcmlwdD4=",
            "data:image/svg+xml;base64,PHNjcmlwdD4=",
        ] {
            let (_, mime) = decode_file_data(data_url).unwrap();
            assert_eq!(mime, "application/octet-stream", "{data_url}");
        }
        assert!(is_image_type("image/png; q=1"));
        assert!(!is_image_type("text/html"));
    }

    #[test]
    fn file_names_reduce_to_one_safe_component() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\owl 1.jpg"), "owl_1.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[actix_web::test]
    async fn photo_submission_is_stored_pending_with_uploaded_key() {
        let (_dir, kv) = store();
        let storage = RecordingStorage::default();

        let receipt = submit_photo(&kv, &storage, "photos", &user(), request(" Ferns ")).await.unwrap();
        assert!(receipt.submission_id.starts_with(PHOTO_PREFIX));
        assert_eq!(receipt.status, SubmissionStatus::Pending);

        let uploads = storage.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "photos");
        assert!(uploads[0].1.ends_with("-ferns_at_dawn.png"));
        assert_eq!(uploads[0].2, "image/png");

        let stored: Vec<Submission> = read_records(&kv, PHOTO_PREFIX).unwrap();
        match &stored[..] {
            [Submission::Photo(photo)] => {
                assert_eq!(photo.title, "Ferns");
                assert_eq!(photo.user_name, "Jo");
                assert_eq!(photo.description.as_deref(), Some("Morning light"));
                assert_eq!(photo.file_name, uploads[0].1);
            }
            other => panic!("unexpected records: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn blank_title_is_rejected_before_upload() {
        let (_dir, kv) = store();
        let storage = RecordingStorage::default();

        let result = submit_photo(&kv, &storage, "photos", &user(), request("   ")).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(storage.uploads.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn storage_rejection_is_upload_failed_and_writes_nothing() {
        let (_dir, kv) = store();
        let storage = RecordingStorage { reject: true, ..Default::default() };

        let result = submit_photo(&kv, &storage, "photos", &user(), request("Ferns")).await;
        assert!(matches!(result, Err(ApiError::UploadFailed)));
        assert!(kv.get_by_prefix(PHOTO_PREFIX).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn failed_record_write_removes_the_uploaded_object() {
        let storage = RecordingStorage::default();

        let result = submit_photo(&ReadOnlyKv, &storage, "photos", &user(), request("Ferns")).await;
        assert!(matches!(result, Err(ApiError::Internal)));

        let uploaded = storage.uploads.lock().unwrap()[0].1.clone();
        assert_eq!(*storage.removed.lock().unwrap(), vec![uploaded]);
    }

    #[test]
    fn testimonial_is_stored_pending_and_stripped() {
        let (_dir, kv) = store();
        let id = submit_testimonial(
            &kv,
            TestimonialRequest {
                name: "Ann".into(),
                role: "Visitor".into(),
                rating: 5,
                text: "Great!<script>x</script>".into(),
                email: "a@b.com".into(),
            },
        )
        .unwrap();

        let stored = kv.get(&id).unwrap().unwrap();
        assert_eq!(stored["kind"], "testimonial");
        assert_eq!(stored["status"], "pending");
        assert_eq!(stored["text"], "Great!");
    }
}
