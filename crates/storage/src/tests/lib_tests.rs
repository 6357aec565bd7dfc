use super::*;

fn fields(name: &str) -> SubmissionFields {
    SubmissionFields {
        app_name_en: name.to_string(),
        app_name_ar: "فو".to_string(),
        privacy_link: "https://x.com/p".to_string(),
        short_description: "ok".to_string(),
        long_description: "ok".to_string(),
        logo_url: format!("http://localhost/assets/app_logos/1/1-{name}.png"),
        screenshot_urls: vec![
            "http://localhost/assets/app_screenshots/1/2-a.png".to_string(),
            "http://localhost/assets/app_screenshots/1/3-b.png".to_string(),
        ],
    }
}

async fn storage_with_user() -> (Storage, UserId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let user = storage
        .create_user("Alice", "alice@example.com", Role::Writer, "hash")
        .await
        .expect("user");
    (storage, user.id)
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn inserted_submission_round_trips_all_columns() {
    let (storage, user) = storage_with_user().await;
    let created = storage
        .insert_submission(&fields("Foo"), user)
        .await
        .expect("insert");

    let loaded = storage
        .load_submission(created.id)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(loaded, created);
    assert_eq!(loaded.app_name_ar, "فو");
    assert_eq!(loaded.screenshot_urls.len(), 2);
    assert_eq!(loaded.created_by, Some(user));
    assert_eq!(loaded.created_at, loaded.updated_at);
}

#[tokio::test]
async fn lists_submissions_newest_first() {
    let (storage, user) = storage_with_user().await;
    let first = storage
        .insert_submission(&fields("First"), user)
        .await
        .expect("first");
    let second = storage
        .insert_submission(&fields("Second"), user)
        .await
        .expect("second");

    let listed = storage.list_submissions().await.expect("list");
    let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn update_keeps_creator_and_bumps_updated_at() {
    let (storage, user) = storage_with_user().await;
    let created = storage
        .insert_submission(&fields("Foo"), user)
        .await
        .expect("insert");

    let mut changed = fields("Foo");
    changed.short_description = "new".to_string();
    let updated = storage
        .update_submission(created.id, &changed)
        .await
        .expect("update")
        .expect("present");
    assert_eq!(updated.short_description, "new");
    assert_eq!(updated.created_by, Some(user));
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);

    let missing = storage
        .update_submission(SubmissionId(9_999), &changed)
        .await
        .expect("update");
    assert!(missing.is_none());
}

#[tokio::test]
async fn delete_removes_row_once() {
    let (storage, user) = storage_with_user().await;
    let created = storage
        .insert_submission(&fields("Foo"), user)
        .await
        .expect("insert");

    assert!(storage.delete_submission(created.id).await.expect("delete"));
    assert!(!storage.delete_submission(created.id).await.expect("delete again"));
    assert!(storage
        .load_submission(created.id)
        .await
        .expect("load")
        .is_none());
}

#[tokio::test]
async fn deleting_creator_keeps_submission() {
    let (storage, user) = storage_with_user().await;
    let created = storage
        .insert_submission(&fields("Foo"), user)
        .await
        .expect("insert");

    assert!(storage.delete_user(user).await.expect("delete user"));
    let loaded = storage
        .load_submission(created.id)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(loaded.created_by, None);
}

#[tokio::test]
async fn user_email_is_unique_and_case_insensitive() {
    let (storage, user) = storage_with_user().await;
    let found = storage
        .find_user_by_email("ALICE@example.com")
        .await
        .expect("find")
        .expect("present");
    assert_eq!(found.id, user);

    let duplicate = storage
        .create_user("Other", "Alice@Example.com", Role::Admin, "hash")
        .await;
    assert!(duplicate.is_err());
    assert_eq!(storage.count_users().await.expect("count"), 1);
}

#[tokio::test]
async fn updates_user_name_and_role() {
    let (storage, user) = storage_with_user().await;
    let updated = storage
        .update_user(user, "Alice A.", Role::Admin)
        .await
        .expect("update")
        .expect("present");
    assert_eq!(updated.name, "Alice A.");
    assert_eq!(updated.role, Role::Admin);
    assert_eq!(updated.email, "alice@example.com");

    let listed = storage.list_users().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].role, Role::Admin);
}
