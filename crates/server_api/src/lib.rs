//! Submission, account, and session operations behind the HTTP surface.
//!
//! Every operation receives the acting user explicitly as an [`Actor`]; there
//! is no ambient session state.

use std::sync::Arc;

use shared::{
    domain::{Role, UserId},
    error::{ApiError, ErrorCode},
    protocol::{SubmissionRecord, UserSummary},
};
use storage::{ObjectStore, Storage, StoredSubmission, StoredUser};

pub mod auth;
pub mod password;
pub mod submissions;
pub mod users;

pub use auth::{login, resolve_actor, AuthConfig, Claims};
pub use submissions::{
    create_submission, delete_submission, fetch_asset, get_submission, list_submissions,
    update_submission,
};
pub use users::{
    bootstrap_admin, create_user, current_user, delete_user, list_users, provision_user,
    update_user,
};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub assets: Arc<dyn ObjectStore>,
    pub auth: AuthConfig,
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::new(
                ErrorCode::Forbidden,
                "Admin role required",
            ))
        }
    }
}

pub(crate) fn record_from_stored(stored: StoredSubmission) -> SubmissionRecord {
    SubmissionRecord {
        id: stored.id,
        app_name_en: stored.app_name_en,
        app_name_ar: stored.app_name_ar,
        privacy_link: stored.privacy_link,
        short_description: stored.short_description,
        long_description: stored.long_description,
        logo_url: stored.logo_url,
        screenshot_urls: stored.screenshot_urls,
        created_by: stored.created_by,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    }
}

pub(crate) fn summary_from_stored(stored: StoredUser) -> UserSummary {
    UserSummary {
        id: stored.id,
        name: stored.name,
        email: stored.email,
        role: stored.role,
        created_at: stored.created_at,
    }
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
