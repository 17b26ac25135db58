use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use laurel_api::auth::{AppState, AppStateInner};
use laurel_api::notify::{CodeIssuer, Mailer};
use laurel_db::Database;
use laurel_types::api::Claims;
use laurel_types::models::Role;

const SECRET: &str = "test-secret";
const CODE: &str = "FIXEDCODE123";

struct FixedCodes;

impl CodeIssuer for FixedCodes {
    fn issue(&self) -> String {
        CODE.to_string()
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

/// Newtype so the `Mailer` impl lives on a type local to this test crate
/// (the orphan rule forbids implementing it directly for `Arc<RecordingMailer>`).
struct SharedMailer(Arc<RecordingMailer>);

impl Mailer for SharedMailer {
    fn send_confirmation(&self, to: &str, _username: &str, code: &str) -> anyhow::Result<()> {
        self.0.sent.lock().unwrap().push((to.to_string(), code.to_string()));
        Ok(())
    }
}

struct FailingMailer;

impl Mailer for FailingMailer {
    fn send_confirmation(&self, _to: &str, _username: &str, _code: &str) -> anyhow::Result<()> {
        anyhow::bail!("smtp down")
    }
}

fn app() -> (Router, AppState, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::default());
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.to_string(),
        codes: Box::new(FixedCodes),
        mailer: Box::new(SharedMailer(mailer.clone())),
    });
    (laurel_api::router(state.clone()), state, mailer)
}

fn seed_user(state: &AppState, username: &str, role: Role) -> String {
    let id = Uuid::new_v4().to_string();
    state
        .db
        .create_user(
            &id,
            username,
            &format!("{username}@example.com"),
            role.as_str(),
            "",
            "",
            "",
            "",
        )
        .unwrap();
    id
}

fn bearer(id: &str, username: &str) -> String {
    let claims = Claims {
        sub: id.parse().unwrap(),
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let req = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_title(app: &Router, admin: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/titles",
        Some(admin),
        Some(json!({"name": name, "year": 1972})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// -- Account lifecycle --

#[tokio::test]
async fn sign_up_then_token_exchange() {
    let (app, _state, mailer) = app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"username": "kate", "email": "k@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "kate");
    assert_eq!(body["email"], "k@x.com");
    {
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("k@x.com".to_string(), CODE.to_string())]);
    }

    // Wrong code: 400 and no credential.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/token",
        None,
        Some(json!({"username": "kate", "confirmation_code": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["token"].is_null());

    // Unknown username: 404.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/token",
        None,
        Some(json!({"username": "nobody", "confirmation_code": CODE})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Right code: a usable session token.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/token",
        None,
        Some(json!({"username": "kate", "confirmation_code": CODE})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/users/me",
        Some(&format!("Bearer {token}")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "kate");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn sign_up_rejects_reserved_username() {
    let (app, _state, _mailer) = app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"username": "me", "email": "me@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeat_sign_up_resends_code() {
    let (app, _state, mailer) = app();

    for _ in 0..2 {
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/auth/signup",
            None,
            Some(json!({"username": "kate", "email": "k@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(mailer.sent.lock().unwrap().len(), 2);

    // Same username bound to a different email: a conflict, not a resend.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"username": "kate", "email": "other@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Same email bound to a different username, likewise.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"username": "kate2", "email": "k@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sign_up_survives_mail_failure() {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.to_string(),
        codes: Box::new(FixedCodes),
        mailer: Box::new(FailingMailer),
    });
    let app = laurel_api::router(state);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({"username": "kate", "email": "k@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The account exists and the stored code still works.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/token",
        None,
        Some(json!({"username": "kate", "confirmation_code": CODE})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// -- Catalog policy --

#[tokio::test]
async fn catalog_mutation_is_admin_only() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");
    let moder = bearer(&seed_user(&state, "moder", Role::Moderator), "moder");
    let user = bearer(&seed_user(&state, "user", Role::User), "user");

    let body = json!({"name": "Films", "slug": "films"});

    let (status, _) = send(&app, "POST", "/api/v1/categories", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) =
        send(&app, "POST", "/api/v1/categories", Some(&user), Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        send(&app, "POST", "/api/v1/categories", Some(&admin), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    // Duplicate slug is a validation error.
    let (status, _) = send(&app, "POST", "/api/v1/categories", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Reads are public.
    let (status, body) = send(&app, "GET", "/api/v1/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", "/api/v1/categories/films", Some(&moder), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", "/api/v1/categories/films", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", "/api/v1/categories/films", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn title_create_validates_year_and_slugs() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/titles",
        Some(&admin),
        Some(json!({"name": "Too early", "year": 1800})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/titles",
        Some(&admin),
        Some(json!({"name": "Ghost genre", "year": 1972, "genre": ["missing"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/genres",
        Some(&admin),
        Some(json!({"name": "Drama", "slug": "drama"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/titles",
        Some(&admin),
        Some(json!({"name": "Solaris", "year": 1972, "genre": ["drama"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["genre"][0]["slug"], "drama");
    assert!(body["category"].is_null());
    assert!(body["rating"].is_null());
}

// -- Reviews --

#[tokio::test]
async fn rating_is_recomputed_from_reviews() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");
    let kate = bearer(&seed_user(&state, "kate", Role::User), "kate");
    let juan = bearer(&seed_user(&state, "juan", Role::User), "juan");

    let title = create_title(&app, &admin, "Solaris").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{title}/reviews"),
        Some(&kate),
        Some(json!({"text": "slow but great", "score": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"], "kate");
    let review = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{title}/reviews"),
        Some(&juan),
        Some(json!({"text": "a classic", "score": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", &format!("/api/v1/titles/{title}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], json!(5.5));

    // Deleting a review moves the mean on the next read.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/titles/{title}/reviews/{review}"),
        Some(&kate),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", &format!("/api/v1/titles/{title}"), None, None).await;
    assert_eq!(body["rating"], json!(7.0));
}

#[tokio::test]
async fn one_review_per_author_per_title() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");
    let kate = bearer(&seed_user(&state, "kate", Role::User), "kate");

    let title = create_title(&app, &admin, "Solaris").await;
    let uri = format!("/api/v1/titles/{title}/reviews");

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&kate),
        Some(json!({"text": "first", "score": 8})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&kate),
        Some(json!({"text": "second", "score": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Out-of-range scores never reach the store.
    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(&admin),
        Some(json!({"text": "x", "score": 11})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn review_moderation_policy() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");
    let moder = bearer(&seed_user(&state, "moder", Role::Moderator), "moder");
    let kate = bearer(&seed_user(&state, "kate", Role::User), "kate");
    let juan = bearer(&seed_user(&state, "juan", Role::User), "juan");

    let title = create_title(&app, &admin, "Solaris").await;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{title}/reviews"),
        Some(&kate),
        Some(json!({"text": "mine", "score": 9})),
    )
    .await;
    let review_uri = format!("/api/v1/titles/{title}/reviews/{}", body["id"].as_str().unwrap());

    // A stranger may read but not touch.
    let (status, _) = send(&app, "GET", &review_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "PATCH",
        &review_uri,
        Some(&juan),
        Some(json!({"text": "defaced"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &review_uri, Some(&juan), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The author may edit their own.
    let (status, body) = send(
        &app,
        "PATCH",
        &review_uri,
        Some(&kate),
        Some(json!({"score": 6})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 6);
    assert_eq!(body["text"], "mine");

    // A moderator may remove it outright.
    let (status, _) = send(&app, "DELETE", &review_uri, Some(&moder), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &review_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_review_takes_comments_with_it() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");
    let kate = bearer(&seed_user(&state, "kate", Role::User), "kate");

    let title = create_title(&app, &admin, "Solaris").await;
    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/v1/titles/{title}/reviews"),
        Some(&kate),
        Some(json!({"text": "mine", "score": 9})),
    )
    .await;
    let review = body["id"].as_str().unwrap().to_string();
    let comments_uri = format!("/api/v1/titles/{title}/reviews/{review}/comments");

    let (status, _) = send(
        &app,
        "POST",
        &comments_uri,
        Some(&admin),
        Some(json!({"text": "agreed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", &comments_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/titles/{title}/reviews/{review}"),
        Some(&kate),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The whole comment chain 404s once the review is gone.
    let (status, _) = send(&app, "GET", &comments_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Accounts --

#[tokio::test]
async fn account_admin_surface_is_gated() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");
    let user = bearer(&seed_user(&state, "kate", Role::User), "kate");

    let (status, _) = send(&app, "GET", "/api/v1/users", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/v1/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/users",
        Some(&admin),
        Some(json!({"username": "new_moder", "email": "m@x.com", "role": "moderator"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "moderator");

    let (status, _) = send(&app, "DELETE", "/api/v1/users/new_moder", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", "/api/v1/users/new_moder", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn self_service_profile_cannot_change_role() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");
    let kate = bearer(&seed_user(&state, "kate", Role::User), "kate");

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/users/me",
        Some(&kate),
        Some(json!({"bio": "reviewer of slow cinema", "role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], "reviewer of slow cinema");
    assert_eq!(body["role"], "user");

    // The admin surface does honor role changes.
    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/users/kate",
        Some(&admin),
        Some(json!({"role": "moderator"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "moderator");

    // Anonymous self-service is a 401.
    let (status, _) = send(&app, "GET", "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn category_delete_leaves_title_uncategorized() {
    let (app, state, _mailer) = app();
    let admin = bearer(&seed_user(&state, "admin", Role::Admin), "admin");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/categories",
        Some(&admin),
        Some(json!({"name": "Films", "slug": "films"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/titles",
        Some(&admin),
        Some(json!({"name": "Solaris", "year": 1972, "category": "films"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["category"]["slug"], "films");
    let title = body["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "DELETE", "/api/v1/categories/films", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/v1/titles/{title}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["category"].is_null());
}
