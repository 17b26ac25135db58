use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

// -- JWT Claims --

/// JWT claims for issued session tokens. Canonical definition lives here in
/// laurel-types so the API middleware and the token endpoint share one type.
/// The caller's role is deliberately absent: it is re-read from the store on
/// every request so a role change applies immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
}

/// Sign-up echoes the accepted payload; the confirmation code itself only
/// travels out-of-band.
#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Catalog --

/// Shared shape for categories and genres: a display name plus a unique,
/// URL-safe slug used as the lookup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedSlug {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub genre: Vec<NamedSlug>,
    pub category: Option<NamedSlug>,
    /// Mean review score, recomputed on every read. Null with no reviews.
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTitleRequest {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    /// Genre slugs; unknown slugs reject the request.
    #[serde(default)]
    pub genre: Vec<String>,
    /// Category slug.
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub genre: Option<Vec<String>>,
    pub category: Option<String>,
}

// -- Reviews --

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub text: String,
    /// Author's username, not their opaque id.
    pub author: String,
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub text: String,
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub text: Option<String>,
    pub score: Option<i64>,
}

// -- Comments --

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
}

// -- Users --

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
}

/// Partial update. The admin surface honors `role`; the self-service
/// `/users/me` surface ignores it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}
