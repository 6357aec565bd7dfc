use super::{
    load_settings_from, normalize_database_url, prepare_database_url, Settings, TokenSecret,
    DEV_TOKEN_SECRET,
};

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(None, env_from(&[]));
    assert_eq!(settings.server_bind, "127.0.0.1:8443");
    assert_eq!(settings.max_body_bytes, 48 * 1024 * 1024);
    assert_eq!(settings.public_base_url(), "http://127.0.0.1:8443");
    assert!(settings.bootstrap_admin_email.is_none());
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let file = r#"
        bind_addr = "0.0.0.0:9000"
        asset_root = "/srv/assets"
        token_ttl_minutes = 30
    "#;
    let settings = load_settings_from(
        Some(file),
        env_from(&[
            ("SERVER_BIND", "0.0.0.0:9100"),
            ("APP__BIND_ADDR", "0.0.0.0:9200"),
            ("APP__TOKEN_TTL_MINUTES", "not-a-number"),
            ("APP__BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
            ("SERVER_PUBLIC_URL", "https://apps.example.com/"),
        ]),
    );
    assert_eq!(settings.server_bind, "0.0.0.0:9200");
    assert_eq!(settings.asset_root, "/srv/assets");
    assert_eq!(settings.token_ttl_minutes, 30);
    assert_eq!(settings.bootstrap_admin_email.as_deref(), Some("root@example.com"));
    assert_eq!(settings.public_base_url(), "https://apps.example.com");
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let settings = load_settings_from(Some("bind_addr = "), env_from(&[]));
    assert_eq!(settings.server_bind, Settings::default().server_bind);
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();

    let temp_root = env::temp_dir().join(format!("app_submissions_open_test_{suffix}"));
    let db_path = temp_root.join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    assert!(temp_root.join("nested").exists());
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn built_in_token_secret_is_only_tolerated_on_loopback() {
    let local = load_settings_from(None, env_from(&[]));
    assert_eq!(local.token_secret, DEV_TOKEN_SECRET);
    assert_eq!(local.check_token_secret().expect("loopback"), TokenSecret::DevDefault);

    let named = load_settings_from(None, env_from(&[("APP__BIND_ADDR", "localhost:8443")]));
    assert_eq!(named.check_token_secret().expect("localhost"), TokenSecret::DevDefault);

    let public = load_settings_from(None, env_from(&[("APP__BIND_ADDR", "0.0.0.0:8443")]));
    let err = public.check_token_secret().expect_err("public bind");
    assert!(err.to_string().contains("APP__TOKEN_SECRET"));

    let configured = load_settings_from(
        None,
        env_from(&[
            ("APP__BIND_ADDR", "0.0.0.0:8443"),
            ("APP__TOKEN_SECRET", "a-real-secret"),
        ]),
    );
    assert_eq!(
        configured.check_token_secret().expect("configured"),
        TokenSecret::Configured
    );

    let blank = Settings {
        token_secret: "  ".into(),
        ..Settings::default()
    };
    assert!(blank.check_token_secret().is_err());
}
