//! Persistence adapter for submissions: asset upload plus row write, and the inverse.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{
    domain::{AssetBucket, SubmissionId},
    error::{ApiError, ErrorCode},
    media::{inspect_image, ImageInfo},
    protocol::{AssetUpload, SubmissionPayload, SubmissionRecord},
    validation::{
        logo_error, max_size_message, screenshots_error, text_errors, to_wire, Field,
        FieldErrors, SubmissionText, LOGO_MAX_BYTES, SCREENSHOT_MAX_BYTES,
    },
};
use storage::{KeySequence, StoredObject, SubmissionFields};

use crate::{internal, record_from_stored, Actor, ApiContext};

#[derive(Debug)]
struct DecodedAsset {
    file_name: String,
    bytes: Vec<u8>,
    info: ImageInfo,
}

#[derive(Debug, Default)]
struct DecodedAssets {
    logo: Option<DecodedAsset>,
    screenshots: Vec<DecodedAsset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetRequirement {
    Required,
    Optional,
}

pub async fn create_submission(
    ctx: &ApiContext,
    actor: &Actor,
    payload: &SubmissionPayload,
) -> Result<SubmissionRecord, ApiError> {
    let assets = validate_payload(payload, AssetRequirement::Required)?;

    let mut uploads = Uploads::new(ctx, actor);
    let stored = async {
        let logo_url = match &assets.logo {
            Some(logo) => uploads.put(AssetBucket::Logo, logo).await?,
            None => String::new(),
        };
        let mut screenshot_urls = Vec::with_capacity(assets.screenshots.len());
        for screenshot in &assets.screenshots {
            screenshot_urls.push(uploads.put(AssetBucket::Screenshot, screenshot).await?);
        }
        let fields = fields_from_payload(payload, logo_url, screenshot_urls);
        ctx.storage
            .insert_submission(&fields, actor.user_id)
            .await
            .map_err(internal)
    }
    .await;

    match stored {
        Ok(stored) => {
            tracing::info!(
                submission_id = stored.id.0,
                actor = actor.user_id.0,
                screenshots = stored.screenshot_urls.len(),
                "submission created"
            );
            Ok(record_from_stored(stored))
        }
        Err(err) => {
            uploads.discard().await;
            Err(err)
        }
    }
}

pub async fn get_submission(
    ctx: &ApiContext,
    _actor: &Actor,
    id: SubmissionId,
) -> Result<Option<SubmissionRecord>, ApiError> {
    let stored = ctx.storage.load_submission(id).await.map_err(internal)?;
    Ok(stored.map(record_from_stored))
}

pub async fn list_submissions(
    ctx: &ApiContext,
    _actor: &Actor,
) -> Result<Vec<SubmissionRecord>, ApiError> {
    let stored = ctx.storage.list_submissions().await.map_err(internal)?;
    Ok(stored.into_iter().map(record_from_stored).collect())
}

/// Replaces text fields; a supplied logo or non-empty screenshot list replaces the stored assets.
pub async fn update_submission(
    ctx: &ApiContext,
    actor: &Actor,
    id: SubmissionId,
    payload: &SubmissionPayload,
) -> Result<SubmissionRecord, ApiError> {
    let existing = ctx
        .storage
        .load_submission(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(id))?;
    let assets = validate_payload(payload, AssetRequirement::Optional)?;

    let mut uploads = Uploads::new(ctx, actor);
    let updated = async {
        let logo_url = match &assets.logo {
            Some(logo) => uploads.put(AssetBucket::Logo, logo).await?,
            None => existing.logo_url.clone(),
        };
        let screenshot_urls = if assets.screenshots.is_empty() {
            existing.screenshot_urls.clone()
        } else {
            let mut urls = Vec::with_capacity(assets.screenshots.len());
            for screenshot in &assets.screenshots {
                urls.push(uploads.put(AssetBucket::Screenshot, screenshot).await?);
            }
            urls
        };
        ctx.storage
            .update_submission(id, &fields_from_payload(payload, logo_url, screenshot_urls))
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found(id))
    }
    .await;

    let updated = match updated {
        Ok(updated) => updated,
        Err(err) => {
            uploads.discard().await;
            return Err(err);
        }
    };

    if assets.logo.is_some() && existing.logo_url != updated.logo_url {
        let replaced = std::slice::from_ref(&existing.logo_url);
        remove_assets_best_effort(ctx, AssetBucket::Logo, replaced).await;
    }
    if !assets.screenshots.is_empty() {
        remove_assets_best_effort(ctx, AssetBucket::Screenshot, &existing.screenshot_urls).await;
    }

    tracing::info!(
        submission_id = id.0,
        actor = actor.user_id.0,
        replaced_logo = assets.logo.is_some(),
        replaced_screenshots = !assets.screenshots.is_empty(),
        "submission updated"
    );
    Ok(record_from_stored(updated))
}

/// Deletes the row, then removes its assets. Asset removal failures are logged, not returned.
pub async fn delete_submission(
    ctx: &ApiContext,
    actor: &Actor,
    id: SubmissionId,
) -> Result<(), ApiError> {
    let existing = ctx
        .storage
        .load_submission(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(id))?;

    if !ctx.storage.delete_submission(id).await.map_err(internal)? {
        return Err(not_found(id));
    }

    remove_assets_best_effort(ctx, AssetBucket::Logo, std::slice::from_ref(&existing.logo_url))
        .await;
    remove_assets_best_effort(ctx, AssetBucket::Screenshot, &existing.screenshot_urls).await;

    tracing::info!(submission_id = id.0, actor = actor.user_id.0, "submission deleted");
    Ok(())
}

/// The content type is sniffed from the stored bytes; the key's extension is never trusted.
pub async fn fetch_asset(
    ctx: &ApiContext,
    bucket: AssetBucket,
    key: &str,
) -> Result<StoredObject, ApiError> {
    let mut object = ctx
        .assets
        .get(bucket, key)
        .await
        .map_err(|e| ApiError::new(ErrorCode::NotFound, format!("asset unavailable: {e}")))?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "asset not found"))?;
    object.content_type = match inspect_image(&object.bytes) {
        Ok(info) => info.kind.mime_type().to_string(),
        Err(_) => "application/octet-stream".to_string(),
    };
    Ok(object)
}

fn not_found(id: SubmissionId) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("submission {id} not found"))
}

fn fields_from_payload(
    payload: &SubmissionPayload,
    logo_url: String,
    screenshot_urls: Vec<String>,
) -> SubmissionFields {
    SubmissionFields {
        app_name_en: payload.app_name_en.clone(),
        app_name_ar: payload.app_name_ar.clone(),
        privacy_link: payload.privacy_link.clone(),
        short_description: payload.short_description.clone(),
        long_description: payload.long_description.clone(),
        logo_url,
        screenshot_urls,
    }
}

fn validate_payload(
    payload: &SubmissionPayload,
    requirement: AssetRequirement,
) -> Result<DecodedAssets, ApiError> {
    let mut errors: FieldErrors = text_errors(SubmissionText {
        app_name_en: &payload.app_name_en,
        app_name_ar: &payload.app_name_ar,
        privacy_link: &payload.privacy_link,
        short_description: &payload.short_description,
        long_description: &payload.long_description,
    });
    let mut assets = DecodedAssets::default();

    match &payload.logo {
        Some(upload) => match decode_asset(upload, LOGO_MAX_BYTES, false) {
            Ok(logo) => {
                if let Some(message) = logo_error(true, Some(logo.info.dimensions())) {
                    errors.insert(Field::Logo, message);
                }
                assets.logo = Some(logo);
            }
            Err(message) => {
                errors.insert(Field::Logo, message);
            }
        },
        None if requirement == AssetRequirement::Required => {
            if let Some(message) = logo_error(false, None) {
                errors.insert(Field::Logo, message);
            }
        }
        None => {}
    }

    if requirement == AssetRequirement::Required {
        if let Some(message) = screenshots_error(payload.screenshots.len()) {
            errors.insert(Field::Screenshots, message);
        }
    }
    for (index, upload) in payload.screenshots.iter().enumerate() {
        match decode_asset(upload, SCREENSHOT_MAX_BYTES, true) {
            Ok(screenshot) => assets.screenshots.push(screenshot),
            Err(message) => {
                errors
                    .entry(Field::Screenshots)
                    .or_insert_with(|| format!("Screenshot {}: {message}", index + 1));
            }
        }
    }

    if errors.is_empty() {
        Ok(assets)
    } else {
        Err(ApiError::validation(to_wire(&errors)))
    }
}

fn decode_asset(
    upload: &AssetUpload,
    max_bytes: usize,
    multiple: bool,
) -> Result<DecodedAsset, String> {
    let bytes = STANDARD
        .decode(upload.data_b64.as_bytes())
        .map_err(|_| format!("{} is not valid base64", upload.file_name))?;
    if bytes.len() > max_bytes {
        return Err(max_size_message(max_bytes, multiple));
    }
    let info = inspect_image(&bytes).map_err(|e| e.to_string())?;
    Ok(DecodedAsset {
        file_name: upload.file_name.clone(),
        bytes,
        info,
    })
}

/// Objects written during one operation, so a failed operation can take them back.
struct Uploads<'a> {
    ctx: &'a ApiContext,
    actor: &'a Actor,
    keys: KeySequence,
    written: Vec<(AssetBucket, String)>,
}

impl<'a> Uploads<'a> {
    fn new(ctx: &'a ApiContext, actor: &'a Actor) -> Self {
        Self {
            ctx,
            actor,
            keys: KeySequence::default(),
            written: Vec::new(),
        }
    }

    async fn put(&mut self, bucket: AssetBucket, asset: &DecodedAsset) -> Result<String, ApiError> {
        let file_name = asset.info.kind.normalize_file_name(&asset.file_name);
        let key = self.keys.next_key(self.actor.user_id, &file_name);
        let url = self
            .ctx
            .assets
            .put(bucket, &key, &asset.bytes)
            .await
            .map_err(internal)?;
        tracing::debug!(
            %bucket,
            %key,
            bytes = asset.bytes.len(),
            kind = asset.info.kind.mime_type(),
            "asset stored"
        );
        self.written.push((bucket, key));
        Ok(url)
    }

    async fn discard(self) {
        for (bucket, key) in self.written {
            if let Err(error) = self.ctx.assets.remove(bucket, &[key.clone()]).await {
                tracing::warn!(%bucket, %key, %error, "failed to discard orphaned upload");
            }
        }
    }
}

async fn remove_assets_best_effort(ctx: &ApiContext, bucket: AssetBucket, urls: &[String]) {
    let keys: Vec<String> = urls
        .iter()
        .filter(|url| !url.is_empty())
        .filter_map(|url| ctx.assets.key_for_url(bucket, url))
        .collect();
    if keys.is_empty() {
        return;
    }
    if let Err(error) = ctx.assets.remove(bucket, &keys).await {
        tracing::warn!(
            %bucket,
            count = keys.len(),
            error = %format!("{error:#}"),
            "asset cleanup failed; objects left orphaned"
        );
    }
}

#[cfg(test)]
#[path = "tests/submissions_tests.rs"]
mod tests;
