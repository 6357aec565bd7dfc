use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Role, SubmissionId, UserId};

mod assets;

pub use assets::{object_key, FsObjectStore, KeySequence, ObjectStore, StoredObject};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSubmission {
    pub id: SubmissionId,
    pub app_name_en: String,
    pub app_name_ar: String,
    pub privacy_link: String,
    pub short_description: String,
    pub long_description: String,
    pub logo_url: String,
    pub screenshot_urls: Vec<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values written on insert and update.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFields {
    pub app_name_en: String,
    pub app_name_ar: String,
    pub privacy_link: String,
    pub short_description: String,
    pub long_description: String,
    pub logo_url: String,
    pub screenshot_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

const SUBMISSION_COLUMNS: &str = "id, app_name_en, app_name_ar, privacy_link, \
    short_description, long_description, logo_url, screenshot_urls, created_by, \
    created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, role, password_hash, created_at";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn insert_submission(
        &self,
        fields: &SubmissionFields,
        created_by: UserId,
    ) -> Result<StoredSubmission> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO app_submissions (app_name_en, app_name_ar, privacy_link,
                 short_description, long_description, logo_url, screenshot_urls,
                 created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(&fields.app_name_en)
        .bind(&fields.app_name_ar)
        .bind(&fields.privacy_link)
        .bind(&fields.short_description)
        .bind(&fields.long_description)
        .bind(&fields.logo_url)
        .bind(serde_json::to_string(&fields.screenshot_urls)?)
        .bind(created_by.0)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert submission")?;
        submission_from_row(&row)
    }

    pub async fn load_submission(&self, id: SubmissionId) -> Result<Option<StoredSubmission>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM app_submissions WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(submission_from_row).transpose()
    }

    /// Overwrites every column except the creator and `created_at`.
    pub async fn update_submission(
        &self,
        id: SubmissionId,
        fields: &SubmissionFields,
    ) -> Result<Option<StoredSubmission>> {
        let row = sqlx::query(&format!(
            "UPDATE app_submissions
             SET app_name_en = ?, app_name_ar = ?, privacy_link = ?, short_description = ?,
                 long_description = ?, logo_url = ?, screenshot_urls = ?, updated_at = ?
             WHERE id = ?
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(&fields.app_name_en)
        .bind(&fields.app_name_ar)
        .bind(&fields.privacy_link)
        .bind(&fields.short_description)
        .bind(&fields.long_description)
        .bind(&fields.logo_url)
        .bind(serde_json::to_string(&fields.screenshot_urls)?)
        .bind(Utc::now())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .context("failed to update submission")?;
        row.as_ref().map(submission_from_row).transpose()
    }

    /// Returns whether a row was removed.
    pub async fn delete_submission(&self, id: SubmissionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM app_submissions WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .context("failed to delete submission")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_submissions(&self) -> Result<Vec<StoredSubmission>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM app_submissions ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(submission_from_row).collect()
    }

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        role: Role,
        password_hash: &str,
    ) -> Result<StoredUser> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (name, email, role, password_hash, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert user '{email}'"))?;
        user_from_row(&row)
    }

    pub async fn load_user(&self, id: UserId) -> Result<Option<StoredUser>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Email comparison is case-insensitive.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<StoredUser>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    pub async fn count_users(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn update_user(
        &self,
        id: UserId,
        name: &str,
        role: Role,
    ) -> Result<Option<StoredUser>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET name = ?, role = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(role.as_str())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn delete_user(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn submission_from_row(row: &SqliteRow) -> Result<StoredSubmission> {
    let screenshot_urls: String = row.try_get("screenshot_urls")?;
    Ok(StoredSubmission {
        id: SubmissionId(row.try_get("id")?),
        app_name_en: row.try_get("app_name_en")?,
        app_name_ar: row.try_get("app_name_ar")?,
        privacy_link: row.try_get("privacy_link")?,
        short_description: row.try_get("short_description")?,
        long_description: row.try_get("long_description")?,
        logo_url: row.try_get("logo_url")?,
        screenshot_urls: serde_json::from_str(&screenshot_urls)
            .context("screenshot_urls column is not a JSON string array")?,
        created_by: row.try_get::<Option<i64>, _>("created_by")?.map(UserId),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<StoredUser> {
    let role: String = row.try_get("role")?;
    Ok(StoredUser {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role.parse::<Role>().map_err(|e| anyhow!(e))?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
