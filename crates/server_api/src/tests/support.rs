use std::{
    io::Cursor,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage};
use shared::{
    domain::{AssetBucket, Role},
    protocol::{AssetUpload, SubmissionPayload},
};
use storage::{FsObjectStore, ObjectStore, Storage, StoredObject};
use tempfile::TempDir;

use crate::{password::hash_password, Actor, ApiContext, AuthConfig};

pub(crate) const ADMIN_PASSWORD: &str = "admin-pass";

pub(crate) struct Harness {
    pub ctx: ApiContext,
    pub admin: Actor,
    pub writer: Actor,
    pub fs: Arc<FsObjectStore>,
    _dir: TempDir,
}

enum StoreFault {
    None,
    Remove,
    /// The n-th `put` (1-based) and every later one fail.
    PutFrom(usize),
}

pub(crate) async fn harness() -> Harness {
    build(StoreFault::None).await
}

/// Same as [`harness`] but every `remove` on the object store fails.
pub(crate) async fn harness_with_failing_remove() -> Harness {
    build(StoreFault::Remove).await
}

/// Same as [`harness`] but object writes start failing at the `nth` call.
pub(crate) async fn harness_with_failing_put(nth: usize) -> Harness {
    build(StoreFault::PutFrom(nth)).await
}

async fn build(fault: StoreFault) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let fs = Arc::new(
        FsObjectStore::new(dir.path(), "http://assets.test")
            .await
            .expect("store"),
    );
    let assets: Arc<dyn ObjectStore> = match fault {
        StoreFault::None => fs.clone(),
        StoreFault::Remove => Arc::new(FailingRemove(fs.clone())),
        StoreFault::PutFrom(nth) => Arc::new(FailingPut {
            inner: fs.clone(),
            fail_from: nth,
            calls: AtomicUsize::new(0),
        }),
    };

    let admin = storage
        .create_user(
            "Admin",
            "admin@example.com",
            Role::Admin,
            &hash_password(ADMIN_PASSWORD).expect("hash"),
        )
        .await
        .expect("admin");
    let writer = storage
        .create_user(
            "Writer",
            "writer@example.com",
            Role::Writer,
            &hash_password("writer-pass").expect("hash"),
        )
        .await
        .expect("writer");

    Harness {
        ctx: ApiContext {
            storage,
            assets,
            auth: AuthConfig {
                token_secret: "test-secret".to_string(),
                token_ttl_minutes: 60,
            },
        },
        admin: Actor {
            user_id: admin.id,
            role: admin.role,
        },
        writer: Actor {
            user_id: writer.id,
            role: writer.role,
        },
        fs,
        _dir: dir,
    }
}

struct FailingRemove(Arc<FsObjectStore>);

#[async_trait]
impl ObjectStore for FailingRemove {
    async fn put(&self, bucket: AssetBucket, key: &str, bytes: &[u8]) -> Result<String> {
        self.0.put(bucket, key, bytes).await
    }

    async fn get(&self, bucket: AssetBucket, key: &str) -> Result<Option<StoredObject>> {
        self.0.get(bucket, key).await
    }

    async fn remove(&self, _bucket: AssetBucket, _keys: &[String]) -> Result<()> {
        Err(anyhow!("object store unavailable"))
    }

    fn public_url(&self, bucket: AssetBucket, key: &str) -> String {
        self.0.public_url(bucket, key)
    }
}

struct FailingPut {
    inner: Arc<FsObjectStore>,
    fail_from: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl ObjectStore for FailingPut {
    async fn put(&self, bucket: AssetBucket, key: &str, bytes: &[u8]) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from {
            return Err(anyhow!("disk full"));
        }
        self.inner.put(bucket, key, bytes).await
    }

    async fn get(&self, bucket: AssetBucket, key: &str) -> Result<Option<StoredObject>> {
        self.inner.get(bucket, key).await
    }

    async fn remove(&self, bucket: AssetBucket, keys: &[String]) -> Result<()> {
        self.inner.remove(bucket, keys).await
    }

    fn public_url(&self, bucket: AssetBucket, key: &str) -> String {
        self.inner.public_url(bucket, key)
    }
}

/// Number of objects currently on disk across every bucket.
pub(crate) fn stored_object_count(h: &Harness) -> usize {
    fn count(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|entry| {
                        let path = entry.path();
                        if path.is_dir() {
                            count(&path)
                        } else {
                            1
                        }
                    })
                    .sum()
            })
            .unwrap_or(0)
    }
    AssetBucket::ALL
        .iter()
        .map(|bucket| count(&h.fs.root().join(bucket.name())))
        .sum()
}

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub(crate) fn png_upload(file_name: &str, width: u32, height: u32) -> AssetUpload {
    AssetUpload {
        file_name: file_name.to_string(),
        content_type: "image/png".to_string(),
        data_b64: STANDARD.encode(png_bytes(width, height)),
    }
}

pub(crate) fn valid_payload() -> SubmissionPayload {
    SubmissionPayload {
        app_name_en: "Foo".to_string(),
        app_name_ar: "فو".to_string(),
        privacy_link: "https://x.com/p".to_string(),
        short_description: "ok".to_string(),
        long_description: "ok".to_string(),
        logo: Some(png_upload("logo.png", 512, 512)),
        screenshots: vec![png_upload("home.png", 64, 128), png_upload("detail.png", 64, 128)],
    }
}
