use std::{
    collections::HashMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;

pub const DEFAULT_MAX_BODY_BYTES: usize = 48 * 1024 * 1024;
pub const DEV_TOKEN_SECRET: &str = "dev-insecure-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSecret {
    Configured,
    /// The built-in secret, tolerated only on a loopback bind.
    DevDefault,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub server_public_url: Option<String>,
    pub asset_root: String,
    pub token_secret: String,
    pub token_ttl_minutes: i64,
    pub bootstrap_admin_name: String,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            database_url: "sqlite://./data/server.db".into(),
            server_public_url: None,
            asset_root: "./data/assets".into(),
            token_secret: DEV_TOKEN_SECRET.into(),
            token_ttl_minutes: 12 * 60,
            bootstrap_admin_name: "Administrator".into(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Settings {
    /// Base used for asset URLs; falls back to the bind address.
    pub fn public_base_url(&self) -> String {
        match &self.server_public_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => format!("http://{}", self.server_bind),
        }
    }

    /// Refuses an empty secret, and the built-in one unless the server only listens on loopback.
    pub fn check_token_secret(&self) -> anyhow::Result<TokenSecret> {
        let secret = self.token_secret.trim();
        if secret.is_empty() {
            bail!("token secret is empty; set APP__TOKEN_SECRET");
        }
        if secret != DEV_TOKEN_SECRET {
            return Ok(TokenSecret::Configured);
        }
        if is_loopback_bind(&self.server_bind) {
            Ok(TokenSecret::DevDefault)
        } else {
            bail!(
                "refusing to serve on {} with the built-in token secret; set APP__TOKEN_SECRET",
                self.server_bind
            )
        }
    }
}

fn is_loopback_bind(bind: &str) -> bool {
    match bind.parse::<SocketAddr>() {
        Ok(addr) => addr.ip().is_loopback(),
        Err(_) => bind
            .rsplit_once(':')
            .is_some_and(|(host, _)| host.eq_ignore_ascii_case("localhost")),
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml` keys, then environment variables; later sources win.
pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(error) => tracing::warn!(%error, "ignoring unreadable server.toml"),
        }
    }

    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = env(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    for key in ["SERVER_PUBLIC_URL", "APP__PUBLIC_URL"] {
        if let Some(v) = env(key) {
            settings.server_public_url = Some(v);
        }
    }
    if let Some(v) = env("APP__ASSET_ROOT") {
        settings.asset_root = v;
    }
    if let Some(v) = env("APP__TOKEN_SECRET") {
        settings.token_secret = v;
    }
    if let Some(v) = env("APP__TOKEN_TTL_MINUTES") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.token_ttl_minutes = parsed;
        }
    }
    if let Some(v) = env("APP__BOOTSTRAP_ADMIN_NAME") {
        settings.bootstrap_admin_name = v;
    }
    if let Some(v) = env("APP__BOOTSTRAP_ADMIN_EMAIL") {
        settings.bootstrap_admin_email = Some(v);
    }
    if let Some(v) = env("APP__BOOTSTRAP_ADMIN_PASSWORD") {
        settings.bootstrap_admin_password = Some(v);
    }
    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, toml::Value>) {
    let text = |key: &str| file_cfg.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let integer = |key: &str| file_cfg.get(key).and_then(|v| v.as_integer());

    if let Some(v) = text("bind_addr") {
        settings.server_bind = v;
    }
    if let Some(v) = text("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = text("server_public_url") {
        settings.server_public_url = Some(v);
    }
    if let Some(v) = text("asset_root") {
        settings.asset_root = v;
    }
    if let Some(v) = text("token_secret") {
        settings.token_secret = v;
    }
    if let Some(v) = integer("token_ttl_minutes") {
        settings.token_ttl_minutes = v;
    }
    if let Some(v) = text("bootstrap_admin_name") {
        settings.bootstrap_admin_name = v;
    }
    if let Some(v) = text("bootstrap_admin_email") {
        settings.bootstrap_admin_email = Some(v);
    }
    if let Some(v) = text("bootstrap_admin_password") {
        settings.bootstrap_admin_password = Some(v);
    }
    if let Some(v) = integer("max_body_bytes").and_then(|v| usize::try_from(v).ok()) {
        settings.max_body_bytes = v;
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
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
#[path = "tests/config_tests.rs"]
mod tests;
