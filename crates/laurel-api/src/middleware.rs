use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;
use uuid::Uuid;

use laurel_types::api::Claims;
use laurel_types::models::Role;

use crate::auth::AppState;
use crate::error::ApiError;

/// The authenticated caller. The role comes from the store, not the token,
/// so a role change applies on the next request rather than at the next
/// token issuance.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)?;
        actor_from_token(state, token)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn actor_from_token(state: &AppState, token: &str) -> Result<Actor, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated)?;

    let claims = data.claims;
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::Unauthenticated)?;

    let role = Role::parse(&user.role).unwrap_or_else(|| {
        warn!("Unknown role '{}' on user '{}'", user.role, user.username);
        Role::User
    });

    Ok(Actor {
        id: claims.sub,
        username: user.username,
        role,
    })
}
