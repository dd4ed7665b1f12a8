use crate::error::ApiError;
use crate::helper::identity_helpers::{authenticate, Authorizer, IdentityProvider};
use crate::helper::public_helpers::{fetch_photos_with_status, fetch_testimonials_with_status};
use crate::helper::sanitization_helpers::{sanitize_markdown_content, strip_all_html};
use crate::helper::submission_helpers::new_record_id;
use crate::models::db_operations::kv_db_operations::{write_record, CasOutcome, KvStore};
use crate::models::{
    BlogPost, BlogPostRequest, Identity, ModerationAction, PendingSubmissions, Submission, SubmissionStatus,
    BLOG_PREFIX,
};
use chrono::Utc;

const WORDS_PER_MINUTE: usize = 200;

/// Resolves the bearer token and checks the admin capability.
pub fn require_admin(
    identity: &dyn IdentityProvider,
    authorizer: &dyn Authorizer,
    token: Option<&str>,
) -> Result<Identity, ApiError> {
    let user = authenticate(identity, token)?;
    if authorizer.is_admin(&user.id)? {
        Ok(user)
    } else {
        log::warn!("User {} attempted an admin action", user.id);
        Err(ApiError::Forbidden("Admin access required".to_string()))
    }
}

pub fn list_pending(kv: &dyn KvStore) -> Result<PendingSubmissions, ApiError> {
    Ok(PendingSubmissions {
        photos: fetch_photos_with_status(kv, SubmissionStatus::Pending)?,
        testimonials: fetch_testimonials_with_status(kv, SubmissionStatus::Pending)?,
    })
}

/// Moves a pending submission to approved or rejected. Writes nothing unless the
/// transition is valid and the stored record is unchanged since it was read.
pub fn moderate(kv: &dyn KvStore, admin: &Identity, item_id: &str, action: &str) -> Result<ModerationAction, ApiError> {
    let action = ModerationAction::parse(action)
        .ok_or_else(|| ApiError::BadRequest("Action must be 'approve' or 'reject'".to_string()))?;

    let current = kv
        .get(item_id)?
        .ok_or_else(|| ApiError::NotFound("Item not found".to_string()))?;
    let mut submission: Submission = serde_json::from_value(current.clone())
        .map_err(|_| ApiError::BadRequest("Item cannot be moderated".to_string()))?;

    submission
        .apply_moderation(action, &admin.email, Utc::now())
        .map_err(|status| ApiError::Conflict(format!("Item has already been {}", status.as_str())))?;

    let updated = serde_json::to_value(&submission).map_err(|e| {
        log::error!("Failed to serialize moderated item {}: {}", item_id, e);
        ApiError::Internal
    })?;

    match kv.compare_and_set(item_id, &current, &updated)? {
        CasOutcome::Swapped => {
            log::info!("{} {} by {}", item_id, action.past_tense(), admin.email);
            Ok(action)
        }
        CasOutcome::Missing => Err(ApiError::NotFound("Item not found".to_string())),
        CasOutcome::Mismatch(_) => Err(ApiError::Conflict("Item was modified concurrently".to_string())),
    }
}

pub fn read_time(content: &str) -> String {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    format!("{} min read", minutes)
}

pub fn create_blog_post(kv: &dyn KvStore, admin: &Identity, request: BlogPostRequest) -> Result<BlogPost, ApiError> {
    let title = strip_all_html(request.title.trim());
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    let content = sanitize_markdown_content(&request.content);

    let post = BlogPost {
        id: new_record_id(BLOG_PREFIX),
        title,
        excerpt: strip_all_html(request.excerpt.trim()),
        read_time: read_time(&content),
        content,
        category: strip_all_html(request.category.trim()),
        image_url: request.image_url.trim().to_string(),
        author: admin.display_name().to_string(),
        created_at: Utc::now(),
    };
    write_record(kv, &post.id, &post)?;
    log::info!("Blog post {} created by {}", post.id, admin.email);
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::kv_db_operations::{DbError, RedbKvStore};
    use crate::models::{ModerationState, TestimonialSubmission};
    use crate::setup::seed_data;
    use serde_json::Value;
    use tempfile::TempDir;

    /// Serves reads from a real store but loses every guarded write to another writer.
    struct RacingKv(RedbKvStore);

    impl KvStore for RacingKv {
        fn get(&self, key: &str) -> Result<Option<Value>, DbError> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &Value) -> Result<(), DbError> {
            self.0.set(key, value)
        }

        fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, DbError> {
            self.0.get_by_prefix(prefix)
        }

        fn compare_and_set(&self, key: &str, _expected: &Value, _new: &Value) -> Result<CasOutcome, DbError> {
            let current = self.0.get(key)?.unwrap_or(Value::Null);
            Ok(CasOutcome::Mismatch(current))
        }
    }

    fn store() -> (TempDir, RedbKvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbKvStore::open(&dir.path().join("content.redb")).unwrap();
        (dir, store)
    }

    fn admin() -> Identity {
        Identity { id: "admin-1".into(), email: "curator@haven.org".into(), name: Some("Curator".into()) }
    }

    fn put_pending_testimonial(kv: &RedbKvStore, id: &str) {
        let testimonial = TestimonialSubmission {
            id: id.to_string(),
            name: "Ann".into(),
            role: "Visitor".into(),
            email: "a@b.com".into(),
            rating: 5,
            text: "Great!".into(),
            moderation: ModerationState::pending(Utc::now()),
        };
        write_record(kv, id, &Submission::Testimonial(testimonial)).unwrap();
    }

    #[test]
    fn approve_moves_item_out_of_pending() {
        let (_dir, kv) = store();
        put_pending_testimonial(&kv, "testimonial_x");
        assert_eq!(list_pending(&kv).unwrap().testimonials.len(), 1);

        let action = moderate(&kv, &admin(), "testimonial_x", "approve").unwrap();
        assert_eq!(action, ModerationAction::Approve);

        let stored = kv.get("testimonial_x").unwrap().unwrap();
        assert_eq!(stored["status"], "approved");
        assert_eq!(stored["moderatedBy"], "curator@haven.org");
        assert!(list_pending(&kv).unwrap().testimonials.is_empty());
    }

    #[test]
    fn second_moderation_conflicts_and_changes_nothing() {
        let (_dir, kv) = store();
        put_pending_testimonial(&kv, "testimonial_x");
        moderate(&kv, &admin(), "testimonial_x", "reject").unwrap();
        let after_first = kv.get("testimonial_x").unwrap().unwrap();

        let second = moderate(&kv, &admin(), "testimonial_x", "approve");
        assert!(matches!(second, Err(ApiError::Conflict(_))));
        assert_eq!(kv.get("testimonial_x").unwrap().unwrap(), after_first);
    }

    #[test]
    fn concurrent_modification_is_a_conflict() {
        let (_dir, kv) = store();
        put_pending_testimonial(&kv, "testimonial_x");
        let before = kv.get("testimonial_x").unwrap().unwrap();
        let racing = RacingKv(kv);

        let result = moderate(&racing, &admin(), "testimonial_x", "approve");
        assert!(matches!(result, Err(ApiError::Conflict(msg)) if msg.contains("concurrently")));
        assert_eq!(racing.get("testimonial_x").unwrap().unwrap(), before);
    }

    #[test]
    fn unknown_id_is_not_found_without_writing() {
        let (_dir, kv) = store();
        let result = moderate(&kv, &admin(), "photo_missing", "approve");
        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(kv.get("photo_missing").unwrap(), None);
    }

    #[test]
    fn blog_posts_and_bad_actions_are_rejected() {
        let (_dir, kv) = store();
        seed_data::seed(&kv).unwrap();
        let before: Value = kv.get("blog_1").unwrap().unwrap();

        assert!(matches!(moderate(&kv, &admin(), "blog_1", "approve"), Err(ApiError::BadRequest(_))));
        assert_eq!(kv.get("blog_1").unwrap().unwrap(), before);

        put_pending_testimonial(&kv, "testimonial_x");
        assert!(matches!(moderate(&kv, &admin(), "testimonial_x", "delete"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn read_time_rounds_up_with_minimum_one() {
        assert_eq!(read_time(""), "1 min read");
        assert_eq!(read_time(&"word ".repeat(200)), "1 min read");
        assert_eq!(read_time(&"word ".repeat(201)), "2 min read");
    }

    #[test]
    fn blog_post_gets_author_and_derived_fields() {
        let (_dir, kv) = store();
        let post = create_blog_post(
            &kv,
            &admin(),
            BlogPostRequest {
                title: "Spring <b>count</b>".into(),
                excerpt: "Birds".into(),
                content: "We counted <i>many</i> birds".into(),
                category: "Wildlife".into(),
                image_url: "https://img.test/birds.jpg".into(),
            },
        )
        .unwrap();

        assert!(post.id.starts_with(BLOG_PREFIX));
        assert_eq!(post.title, "Spring count");
        assert_eq!(post.author, "Curator");
        assert_eq!(post.read_time, "1 min read");
        assert!(post.content.contains("&lt;i&gt;"));
        assert_eq!(kv.get(&post.id).unwrap().unwrap()["author"], "Curator");
    }
}
