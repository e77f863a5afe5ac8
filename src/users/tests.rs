//! Flows that need Postgres. Run with `DATABASE_URL=... cargo test -- --ignored`.

use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;

use super::repo::{NewUserRow, User};
use crate::{
    app::{build_app, testing::send},
    auth::password::{hash_password, verify_password},
    state::AppState,
};

pub(crate) async fn create_user(db: &PgPool, email: &str, password: &str) -> User {
    let hash = hash_password(password).unwrap();
    User::create(
        db,
        &NewUserRow {
            email,
            name: "Test",
            password_hash: &hash,
            is_staff: false,
            is_superuser: false,
        },
    )
    .await
    .unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn create_valid_user(pool: PgPool) {
    let app = build_app(AppState::with_pool(pool.clone()));
    let (status, body) = send(
        &app,
        Method::POST,
        "/user/create",
        None,
        Some(json!({"email": "email@SERVER.com", "password": "pass123", "name": "Test name"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"email": "email@server.com", "name": "Test name"}));
    let user = User::find_by_email(&pool, "email@server.com").await.unwrap().unwrap();
    assert!(verify_password("pass123", &user.password_hash).unwrap());
    assert!(!user.is_staff && !user.is_superuser);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_email_is_rejected_case_insensitively(pool: PgPool) {
    create_user(&pool, "email@server.com", "pass123").await;
    let app = build_app(AppState::with_pool(pool));
    let (status, body) = send(
        &app,
        Method::POST,
        "/user/create",
        None,
        Some(json!({"email": "EMAIL@server.com", "password": "pass123", "name": "Other"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn short_password_creates_no_row(pool: PgPool) {
    let app = build_app(AppState::with_pool(pool.clone()));
    let (status, _) = send(
        &app,
        Method::POST,
        "/user/create",
        None,
        Some(json!({"email": "email@server.com", "password": "pw", "name": "Test"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(User::find_by_email(&pool, "email@server.com").await.unwrap().is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn token_flow(pool: PgPool) {
    create_user(&pool, "email@server.com", "pass123").await;
    let app = build_app(AppState::with_pool(pool));

    let (status, body) = send(
        &app,
        Method::POST,
        "/user/token",
        None,
        Some(json!({"email": "Email@Server.com", "password": "pass123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let auth = format!("Bearer {token}");
    let (status, me) = send(&app, Method::GET, "/user/me", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "email@server.com");
    assert!(me.get("password").is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn token_rejections_look_the_same(pool: PgPool) {
    create_user(&pool, "email@server.com", "pass123").await;
    let app = build_app(AppState::with_pool(pool));

    let mut bodies = Vec::new();
    for payload in [
        json!({"email": "email@server.com", "password": "wrong"}),
        json!({"email": "nobody@server.com", "password": "pass123"}),
        json!({"email": "email@server.com", "password": ""}),
    ] {
        let (status, body) = send(&app, Method::POST, "/user/token", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("token").is_none());
        bodies.push(body);
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn update_profile(pool: PgPool) {
    let user = create_user(&pool, "email@server.com", "pass123").await;
    let state = AppState::with_pool(pool.clone());
    let auth = crate::app::testing::bearer(&state, user.id);
    let app = build_app(state);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/user/me",
        Some(&auth),
        Some(json!({"name": "New name", "password": "newpass123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "New name");

    let stored = User::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert!(verify_password("newpass123", &stored.password_hash).unwrap());
    assert_eq!(stored.email, "email@server.com");

    // PUT needs every field
    let (status, body) = send(&app, Method::PUT, "/user/me", Some(&auth), Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());
    assert!(body["password"].is_array());
}
