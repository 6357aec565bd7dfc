//! Bucketed object storage for submission assets.
//!
//! Keys have the shape `{actorId}/{epochMillis}-{fileName}` and are resolved
//! relative to a bucket directory. Public URLs are
//! `{public_base_url}/assets/{bucket}/{key}`.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::domain::{AssetBucket, UserId};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any previous object, and returns its public URL.
    async fn put(&self, bucket: AssetBucket, key: &str, bytes: &[u8]) -> Result<String>;
    async fn get(&self, bucket: AssetBucket, key: &str) -> Result<Option<StoredObject>>;
    /// Missing keys are not an error.
    async fn remove(&self, bucket: AssetBucket, keys: &[String]) -> Result<()>;
    fn public_url(&self, bucket: AssetBucket, key: &str) -> String;

    fn key_for_url(&self, bucket: AssetBucket, url: &str) -> Option<String> {
        let prefix = self.public_url(bucket, "");
        url.strip_prefix(prefix.as_str())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

/// Hands out object keys whose millisecond component never repeats within one batch.
#[derive(Debug, Default)]
pub struct KeySequence {
    last_millis: i64,
}

impl KeySequence {
    pub fn next_key(&mut self, actor: UserId, file_name: &str) -> String {
        let millis = self.next_millis(Utc::now().timestamp_millis());
        object_key(actor, millis, file_name)
    }

    fn next_millis(&mut self, now_millis: i64) -> i64 {
        let millis = now_millis.max(self.last_millis + 1);
        self.last_millis = millis;
        millis
    }
}

pub fn object_key(actor: UserId, millis: i64, file_name: &str) -> String {
    let base_name = file_name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("file");
    format!("{}/{millis}-{base_name}", actor.0)
}

pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub async fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self> {
        let root = root.into();
        for bucket in AssetBucket::ALL {
            let dir = root.join(bucket.name());
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create bucket directory '{}'", dir.display()))?;
        }
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: AssetBucket, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(bucket.name()).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bucket: AssetBucket, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.object_path(bucket, key)?;
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("object key '{key}' has no parent directory"))?;
        fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("object key '{key}' has no file name"))?;
        let staging = parent.join(format!(".{file_name}.partial"));
        fs::write(&staging, bytes)
            .await
            .with_context(|| format!("failed to write object '{bucket}/{key}'"))?;
        fs::rename(&staging, &path)
            .await
            .with_context(|| format!("failed to publish object '{bucket}/{key}'"))?;

        Ok(self.public_url(bucket, key))
    }

    async fn get(&self, bucket: AssetBucket, key: &str) -> Result<Option<StoredObject>> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject {
                bytes,
                content_type: mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .to_string(),
            })),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read object '{bucket}/{key}'")),
        }
    }

    async fn remove(&self, bucket: AssetBucket, keys: &[String]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            let outcome = match self.object_path(bucket, key) {
                Ok(path) => match fs::remove_file(&path).await {
                    Err(err) if err.kind() != ErrorKind::NotFound => Err(anyhow!(err)
                        .context(format!("failed to remove object '{bucket}/{key}'"))),
                    _ => Ok(()),
                },
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                tracing::warn!(%bucket, %key, error = %err, "object removal failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn public_url(&self, bucket: AssetBucket, key: &str) -> String {
        format!("{}/assets/{}/{key}", self.public_base_url, bucket.name())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('\\') {
        bail!("invalid object key '{key}'");
    }
    let escapes = Path::new(key)
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if escapes {
        bail!("object key '{key}' escapes its bucket");
    }
    Ok(())
}
