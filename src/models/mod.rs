use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PHOTO_PREFIX: &str = "photo_";
pub const TESTIMONIAL_PREFIX: &str = "testimonial_";
pub const BLOG_PREFIX: &str = "blog_";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim().to_lowercase().as_str() {
            "approve" => Some(ModerationAction::Approve),
            "reject" => Some(ModerationAction::Reject),
            _ => None,
        }
    }

    pub fn target_status(self) -> SubmissionStatus {
        match self {
            ModerationAction::Approve => SubmissionStatus::Approved,
            ModerationAction::Reject => SubmissionStatus::Rejected,
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            ModerationAction::Approve => "approved",
            ModerationAction::Reject => "rejected",
        }
    }
}

/// Moderation fields shared by every submission kind.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModerationState {
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderated_by: Option<String>,
}

impl ModerationState {
    pub fn pending(created_at: DateTime<Utc>) -> Self {
        Self {
            status: SubmissionStatus::Pending,
            created_at,
            moderated_at: None,
            moderated_by: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSubmission {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub category: String,
    pub file_name: String,
    #[serde(flatten)]
    pub moderation: ModerationState,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialSubmission {
    pub id: String,
    pub name: String,
    pub role: String,
    pub email: String,
    pub rating: i64,
    pub text: String,
    #[serde(flatten)]
    pub moderation: ModerationState,
}

/// A user-originated record awaiting (or past) moderation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Submission {
    Photo(PhotoSubmission),
    Testimonial(TestimonialSubmission),
}

impl Submission {
    pub fn moderation(&self) -> &ModerationState {
        match self {
            Submission::Photo(p) => &p.moderation,
            Submission::Testimonial(t) => &t.moderation,
        }
    }

    fn moderation_mut(&mut self) -> &mut ModerationState {
        match self {
            Submission::Photo(p) => &mut p.moderation,
            Submission::Testimonial(t) => &mut t.moderation,
        }
    }

    pub fn status(&self) -> SubmissionStatus {
        self.moderation().status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.moderation().created_at
    }

    /// Moves a pending submission to its terminal state.
    /// Returns the current status unchanged when the item is no longer pending.
    pub fn apply_moderation(
        &mut self,
        action: ModerationAction,
        moderator: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SubmissionStatus> {
        let state = self.moderation_mut();
        if state.status != SubmissionStatus::Pending {
            return Err(state.status);
        }
        state.status = action.target_status();
        state.moderated_at = Some(at);
        state.moderated_by = Some(moderator.to_string());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: String,
    pub image_url: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub read_time: String,
}

/// An approved photo together with a short-lived retrieval URL.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPhoto {
    #[serde(flatten)]
    pub photo: PhotoSubmission,
    pub image_url: String,
}

#[derive(Debug, Serialize, Default)]
pub struct PendingSubmissions {
    pub photos: Vec<PhotoSubmission>,
    pub testimonials: Vec<TestimonialSubmission>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Identity {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub submission_id: String,
    pub status: SubmissionStatus,
}

// --- Request payloads ---

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSubmissionRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub file_data: String,
    #[serde(default)]
    pub file_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TestimonialRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ModerationRequest {
    pub id: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub mod db_operations;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pending_testimonial() -> Submission {
        Submission::Testimonial(TestimonialSubmission {
            id: "testimonial_abc".to_string(),
            name: "Ann".to_string(),
            role: "Visitor".to_string(),
            email: "a@b.com".to_string(),
            rating: 5,
            text: "Great!".to_string(),
            moderation: ModerationState::pending(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
        })
    }

    #[test]
    fn submission_serializes_with_kind_tag_and_flat_moderation_fields() {
        let json = serde_json::to_value(pending_testimonial()).unwrap();
        assert_eq!(json["kind"], "testimonial");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["name"], "Ann");
        assert!(json.get("moderatedAt").is_none());

        let back: Submission = serde_json::from_value(json).unwrap();
        assert_eq!(back, pending_testimonial());
    }

    #[test]
    fn approving_pending_item_stamps_moderator() {
        let mut item = pending_testimonial();
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap();
        item.apply_moderation(ModerationAction::Approve, "admin@haven.org", at).unwrap();

        assert_eq!(item.status(), SubmissionStatus::Approved);
        assert_eq!(item.moderation().moderated_at, Some(at));
        assert_eq!(item.moderation().moderated_by.as_deref(), Some("admin@haven.org"));
    }

    #[test]
    fn moderated_item_cannot_be_moderated_again() {
        let mut item = pending_testimonial();
        item.apply_moderation(ModerationAction::Reject, "admin@haven.org", Utc::now()).unwrap();

        let second = item.apply_moderation(ModerationAction::Approve, "other@haven.org", Utc::now());
        assert_eq!(second, Err(SubmissionStatus::Rejected));
        assert_eq!(item.status(), SubmissionStatus::Rejected);
        assert_eq!(item.moderation().moderated_by.as_deref(), Some("admin@haven.org"));
    }

    #[test]
    fn moderation_action_parsing() {
        assert_eq!(ModerationAction::parse("approve"), Some(ModerationAction::Approve));
        assert_eq!(ModerationAction::parse(" Reject "), Some(ModerationAction::Reject));
        assert_eq!(ModerationAction::parse("delete"), None);
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut identity = Identity { id: "u1".into(), email: "jo@haven.org".into(), name: None };
        assert_eq!(identity.display_name(), "jo@haven.org");
        identity.name = Some("Jo".into());
        assert_eq!(identity.display_name(), "Jo");
    }
}
