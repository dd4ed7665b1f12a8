pub mod admin_helpers;
pub mod identity_helpers;
pub mod public_helpers;
pub mod sanitization_helpers;
pub mod storage_helpers;
pub mod submission_helpers;
