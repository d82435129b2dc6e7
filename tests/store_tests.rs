//! Credential-store behavior tests against an in-memory database.

use sokoni::config::SecurityConfig;
use sokoni::db::{ClientOrigin, NewUser, Role, Store};

async fn test_store() -> Store {
    Store::open("sqlite::memory:", SecurityConfig::default())
        .await
        .expect("Failed to open in-memory store")
}

fn new_user(username: &str, email: &str, password: Option<&str>) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password: password.map(ToString::to_string),
        ..Default::default()
    }
}

#[tokio::test]
async fn signup_then_lookup_round_trip() {
    let store = test_store().await;

    let created = store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    let found = store
        .find_user_by_email("biz1@example.com")
        .await
        .unwrap()
        .expect("user should be found by email");

    assert_eq!(found.id, created.id);
    assert_eq!(found.username, "biz1");
    assert!(!found.email_verified);
    assert!(found.is_active);
    assert!(found.last_login.is_none());
    assert_eq!(found.role, Role::User);

    let by_name = store.find_user_by_username("biz1").await.unwrap();
    assert!(by_name.is_some());
}

#[tokio::test]
async fn create_user_requires_an_auth_method() {
    let store = test_store().await;

    let result = store
        .create_user(new_user("nobody", "nobody@example.com", None), Role::User)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn duplicate_email_is_a_constraint_violation() {
    let store = test_store().await;

    store
        .create_user(new_user("first", "dup@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    let result = store
        .create_user(new_user("second", "dup@example.com", Some("Secret123!")), Role::User)
        .await;

    match result {
        Err(sokoni::db::StoreError::Constraint(_)) => {}
        other => panic!("expected constraint violation, got {other:?}"),
    }
}

#[tokio::test]
async fn verify_password_matches_only_the_right_password() {
    let store = test_store().await;
    let origin = ClientOrigin::default();

    store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    let miss = store
        .verify_user_password("biz1@example.com", "WrongPass", &origin)
        .await
        .unwrap();
    assert!(miss.is_none());

    let hit = store
        .verify_user_password("biz1@example.com", "Secret123!", &origin)
        .await
        .unwrap();
    assert!(hit.is_some());

    let unknown = store
        .verify_user_password("ghost@example.com", "Secret123!", &origin)
        .await
        .unwrap();
    assert!(unknown.is_none());

    // One attempt row per verification call, success flag matching each
    // outcome, and a reason only on failures.
    let (attempts, _) = store.audit_repo().login_attempts(1, 10, None).await.unwrap();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts.iter().filter(|a| a.success).count(), 1);
    assert!(
        attempts
            .iter()
            .filter(|a| !a.success)
            .all(|a| a.failure_reason.is_some())
    );
}

#[tokio::test]
async fn verify_password_by_username_works() {
    let store = test_store().await;
    let origin = ClientOrigin::default();

    store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    assert!(
        store
            .verify_user_password_by_username("biz1", "Secret123!", &origin)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        store
            .verify_user_password_by_username("biz1", "nope-nope", &origin)
            .await
            .unwrap()
            .is_none()
    );

    // The success row carries the account's email even though the username
    // was the submitted identifier.
    let (attempts, _) = store.audit_repo().login_attempts(1, 10, None).await.unwrap();
    let success = attempts.iter().find(|a| a.success).unwrap();
    assert_eq!(success.email, "biz1@example.com");
}

#[tokio::test]
async fn deactivated_users_disappear_from_lookups() {
    let store = test_store().await;

    let user = store
        .create_user(new_user("gone", "gone@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    assert!(store.deactivate_user(user.id).await.unwrap());

    assert!(store.find_user_by_email("gone@example.com").await.unwrap().is_none());
    assert!(store.find_user_by_username("gone").await.unwrap().is_none());
    assert!(store.get_user_by_id(user.id).await.unwrap().is_none());

    // The row still exists: the admin listing sees it, inactive.
    let all = store.list_users().await.unwrap();
    let row = all.iter().find(|u| u.id == user.id).expect("row retained");
    assert!(!row.is_active);

    // Deactivation is not repeatable once flipped.
    assert!(!store.deactivate_user(user.id).await.unwrap());
}

#[tokio::test]
async fn last_login_is_set_by_update() {
    let store = test_store().await;

    let user = store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();
    assert!(user.last_login.is_none());

    store.update_last_login(user.id).await.unwrap();

    let found = store.get_user_by_id(user.id).await.unwrap().unwrap();
    assert!(found.last_login.is_some());
}

#[tokio::test]
async fn two_factor_setup_is_an_upsert() {
    let store = test_store().await;

    let user = store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    let (first, first_codes) = store.create_2fa(user.id, "secret-one").await.unwrap();
    assert_eq!(first.secret, "secret-one");
    assert_eq!(first_codes.len(), 8);
    assert!(!first.enabled);

    let (second, second_codes) = store.create_2fa(user.id, "secret-two").await.unwrap();
    assert_eq!(second.secret, "secret-two");
    assert_ne!(first_codes, second_codes);

    // Exactly one config row, reflecting the latest call.
    let config = store.get_2fa(user.id).await.unwrap().unwrap();
    assert_eq!(config.secret, "secret-two");

    // The old codes were rotated out.
    let remaining = store
        .two_factor_repo()
        .remaining_backup_codes(user.id)
        .await
        .unwrap();
    assert_eq!(remaining, 8);
    assert!(!store.consume_backup_code(user.id, &first_codes[0]).await.unwrap());
}

#[tokio::test]
async fn enable_2fa_without_a_row_is_a_noop() {
    let store = test_store().await;

    let user = store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    store.enable_2fa(user.id).await.unwrap();
    assert!(store.get_2fa(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn enable_2fa_flips_the_flag_once() {
    let store = test_store().await;

    let user = store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    store.create_2fa(user.id, "secret").await.unwrap();
    store.enable_2fa(user.id).await.unwrap();

    let config = store.get_2fa(user.id).await.unwrap().unwrap();
    assert!(config.enabled);
    let first_enabled_at = config.enabled_at.clone();
    assert!(first_enabled_at.is_some());

    // Calling again neither fails nor rewrites the timestamp.
    store.enable_2fa(user.id).await.unwrap();
    let config = store.get_2fa(user.id).await.unwrap().unwrap();
    assert_eq!(config.enabled_at, first_enabled_at);
}

#[tokio::test]
async fn backup_codes_are_single_use() {
    let store = test_store().await;

    let user = store
        .create_user(new_user("biz1", "biz1@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    let (_, codes) = store.create_2fa(user.id, "secret").await.unwrap();
    let code = &codes[0];

    assert!(store.consume_backup_code(user.id, code).await.unwrap());
    assert!(!store.consume_backup_code(user.id, code).await.unwrap());
    assert!(!store.consume_backup_code(user.id, "not-a-code").await.unwrap());

    let remaining = store
        .two_factor_repo()
        .remaining_backup_codes(user.id)
        .await
        .unwrap();
    assert_eq!(remaining, 7);
}

#[tokio::test]
async fn login_attempts_are_append_only_records() {
    let store = test_store().await;
    let origin = ClientOrigin {
        ip_address: Some("203.0.113.9".to_string()),
        user_agent: Some("tests".to_string()),
    };

    store
        .audit_repo()
        .insert_login_attempt(None, "biz1@example.com", false, Some("invalid_credentials"), &origin)
        .await
        .unwrap();
    store
        .audit_repo()
        .insert_login_attempt(Some(1), "biz1@example.com", true, None, &origin)
        .await
        .unwrap();

    let (attempts, _) = store
        .audit_repo()
        .login_attempts(1, 10, Some("biz1@example.com".to_string()))
        .await
        .unwrap();

    assert_eq!(attempts.len(), 2);
    let failure = attempts.iter().find(|a| !a.success).unwrap();
    assert!(failure.failure_reason.is_some());
    assert_eq!(failure.ip_address.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn audit_events_record_details() {
    let store = test_store().await;

    store
        .audit_repo()
        .insert_audit_event(
            1,
            "admin.user_deactivated",
            Some(serde_json::json!({ "target_user_id": 2 })),
            &ClientOrigin::default(),
        )
        .await
        .unwrap();

    let (events, _) = store
        .audit_repo()
        .audit_events(1, 10, Some("deactivated".to_string()))
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert!(events[0].details.as_deref().unwrap().contains("target_user_id"));
}

#[tokio::test]
async fn business_crud_and_soft_delete() {
    let store = test_store().await;

    let owner = store
        .create_user(new_user("owner", "owner@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();

    let repo = store.business_repo();
    let input = sokoni::db::repositories::business::BusinessInput {
        name: "Mama Njeri Grocers".to_string(),
        category: "retail".to_string(),
        region: "nairobi".to_string(),
        latitude: -1.2921,
        longitude: 36.8219,
        description: None,
    };

    let created = repo.create(owner.id, input.clone()).await.unwrap();
    assert!(!created.verified);

    let listed = repo.list(Some("nairobi".to_string()), None).await.unwrap();
    assert_eq!(listed.len(), 1);

    // Another user cannot update someone else's listing.
    let stranger = store
        .create_user(new_user("other", "other@example.com", Some("Secret123!")), Role::User)
        .await
        .unwrap();
    assert!(repo.update(created.id, stranger.id, input.clone()).await.unwrap().is_none());

    assert!(repo.set_verified(created.id, true).await.unwrap());
    assert!(repo.deactivate(created.id, Some(owner.id)).await.unwrap());
    assert!(repo.get(created.id).await.unwrap().is_none());
    assert!(repo.list(Some("nairobi".to_string()), None).await.unwrap().is_empty());
}
