use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Role, SubmissionId, UserId};

/// A persisted submission as returned to list/detail views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub app_name_en: String,
    pub app_name_ar: String,
    pub privacy_link: String,
    pub short_description: String,
    pub long_description: String,
    pub logo_url: String,
    pub screenshot_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpload {
    pub file_name: String,
    pub content_type: String,
    pub data_b64: String,
}

/// Body of create and update calls.
///
/// On update an absent logo or an empty screenshot list keeps the stored assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub app_name_en: String,
    pub app_name_ar: String,
    pub privacy_link: String,
    pub short_description: String,
    pub long_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<AssetUpload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<AssetUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub role: Role,
}

fn default_role() -> Role {
    Role::Writer
}
