use super::*;

// =============================================================================
// Role
// =============================================================================

#[test]
fn role_round_trips_through_str() {
    for role in [Role::SuperAdmin, Role::Admin, Role::Student] {
        assert_eq!(Role::parse(role.as_str()), Some(role));
    }
    assert_eq!(Role::parse("teacher"), None);
}

#[test]
fn role_decode_rejects_unknown_value() {
    assert!(matches!(Role::decode("root"), Err(sqlx::Error::Decode(_))));
    assert_eq!(Role::decode("admin").unwrap(), Role::Admin);
}

#[test]
fn super_admin_satisfies_admin_requirement() {
    assert!(Role::SuperAdmin.satisfies(Role::Admin));
    assert!(Role::Admin.satisfies(Role::Admin));
    assert!(!Role::Student.satisfies(Role::Admin));
}

#[test]
fn only_super_admin_satisfies_super_admin_requirement() {
    assert!(Role::SuperAdmin.satisfies(Role::SuperAdmin));
    assert!(!Role::Admin.satisfies(Role::SuperAdmin));
}

#[test]
fn student_requirement_is_exact() {
    assert!(Role::Student.satisfies(Role::Student));
    assert!(!Role::Admin.satisfies(Role::Student));
}

#[test]
fn role_deserializes_from_snake_case() {
    let role: Role = serde_json::from_str(r#""super_admin""#).unwrap();
    assert_eq!(role, Role::SuperAdmin);
}

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn normalize_email_trims_and_lowercases() {
    assert_eq!(normalize_email("  Ada@Example.COM "), Some("ada@example.com".to_owned()));
}

#[test]
fn normalize_email_rejects_invalid_shapes() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("ada"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("ada@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
}

// =============================================================================
// Password hashing
// =============================================================================

#[test]
fn hash_password_rejects_short_passwords() {
    assert!(matches!(hash_password("short"), Err(UserError::WeakPassword)));
}

#[test]
fn hash_password_produces_argon2id_phc_string() {
    let hash = hash_password("correct horse battery").unwrap();
    assert!(hash.starts_with("$argon2id$"));
}

#[test]
fn verify_password_accepts_match_and_rejects_mismatch() {
    let hash = hash_password("correct horse battery").unwrap();
    assert!(verify_password("correct horse battery", &hash));
    assert!(!verify_password("wrong horse battery", &hash));
}

#[test]
fn verify_password_rejects_malformed_hash() {
    assert!(!verify_password("anything at all", "not-a-phc-string"));
}

#[test]
fn hashes_are_salted() {
    let a = hash_password("same password").unwrap();
    let b = hash_password("same password").unwrap();
    assert_ne!(a, b);
}

// =============================================================================
// Live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn credentials_and_self_protection() {
    let pool = crate::services::test_support::integration_pool().await;
    let admin = create_user(
        &pool,
        None,
        &NewUser {
            email: "Root@Example.com".into(),
            name: "Root".into(),
            password: "super secret".into(),
            role: Role::SuperAdmin,
        },
    )
    .await
    .expect("create");
    assert_eq!(admin.email, "root@example.com");

    let duplicate = create_user(
        &pool,
        None,
        &NewUser { email: "root@example.com".into(), name: String::new(), password: "another one".into(), role: Role::Admin },
    )
    .await;
    assert!(matches!(duplicate, Err(UserError::EmailTaken)));

    let ok = verify_credentials(&pool, " ROOT@example.com", "super secret").await.expect("login");
    assert_eq!(ok.id, admin.id);
    assert!(matches!(
        verify_credentials(&pool, "root@example.com", "wrong password").await,
        Err(UserError::InvalidCredentials)
    ));
    assert!(matches!(
        verify_credentials(&pool, "nobody@example.com", "super secret").await,
        Err(UserError::InvalidCredentials)
    ));

    let demote = UserUpdate { role: Some(Role::Student), ..UserUpdate::default() };
    assert!(matches!(update_user(&pool, admin.id, admin.id, &demote).await, Err(UserError::SelfModification)));
    assert!(matches!(delete_user(&pool, admin.id, admin.id).await, Err(UserError::SelfModification)));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn user_changes_commit_with_their_activity_row() {
    let pool = crate::services::test_support::integration_pool().await;
    let admin = crate::services::test_support::seed_user(&pool, "root@example.com", Role::SuperAdmin).await;

    let student = create_user(
        &pool,
        Some(admin),
        &NewUser { email: "kim@example.com".into(), name: "Kim".into(), password: "password123".into(), role: Role::Student },
    )
    .await
    .expect("create");
    let rename = UserUpdate { name: Some("Kim Lee".into()), ..UserUpdate::default() };
    update_user(&pool, admin, student.id, &rename).await.expect("update");

    let actions: Vec<String> =
        sqlx::query_scalar("SELECT action FROM admin_activity_logs WHERE entity_id = $1 ORDER BY id")
            .bind(student.id)
            .fetch_all(&pool)
            .await
            .expect("activity");
    assert_eq!(actions, ["user.create", "user.update"]);

    // An actor that cannot be logged rolls the change back with the log row.
    let ghost = Uuid::new_v4();
    let rename = UserUpdate { name: Some("Nobody".into()), ..UserUpdate::default() };
    assert!(matches!(update_user(&pool, ghost, student.id, &rename).await, Err(UserError::Database(_))));
    assert!(matches!(delete_user(&pool, ghost, student.id).await, Err(UserError::Database(_))));
    let kept = get_user(&pool, student.id).await.expect("still there");
    assert_eq!(kept.name, "Kim Lee");
}
