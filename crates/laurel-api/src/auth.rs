use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;
use uuid::Uuid;

use laurel_db::{Database, DbError};
use laurel_types::api::{Claims, SignUpRequest, SignUpResponse, TokenRequest, TokenResponse};
use laurel_types::models::Role;

use crate::error::ApiError;
use crate::notify::{CodeIssuer, Mailer};
use crate::validate;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub codes: Box<dyn CodeIssuer>,
    pub mailer: Box<dyn Mailer>,
}

const TOKEN_TTL_DAYS: i64 = 7;

/// POST /auth/signup — create the account (or refresh an existing one's
/// confirmation code, keyed by the exact (username, email) pair) and send
/// the code out-of-band.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::username(&req.username)?;
    validate::email(&req.email)?;

    let code = state.codes.issue();

    match state.db.get_user_by_username(&req.username)? {
        // Exact pair already registered: a resend request, not an error.
        Some(user) if user.email == req.email => {
            state.db.set_confirmation_code(&user.id, &code)?;
        }
        Some(_) => {
            return Err(ApiError::validation("username is already taken"));
        }
        None => {
            if state.db.get_user_by_email(&req.email)?.is_some() {
                return Err(ApiError::validation("email is already registered"));
            }
            let id = Uuid::new_v4().to_string();
            state
                .db
                .create_user(&id, &req.username, &req.email, Role::User.as_str(), "", "", "", &code)
                .map_err(|e| match e {
                    // Racing sign-up hit the UNIQUE constraint first.
                    DbError::Conflict(_) => {
                        ApiError::validation("username or email is already registered")
                    }
                    other => other.into(),
                })?;
        }
    }

    // Best-effort dispatch: a mail failure must not roll back the account.
    if let Err(e) = state.mailer.send_confirmation(&req.email, &req.username, &code) {
        warn!("confirmation mail to {} failed: {e:#}", req.email);
    }

    Ok(Json(SignUpResponse {
        username: req.username,
        email: req.email,
    }))
}

/// POST /auth/token — exchange a confirmation code for a session token.
/// The code is verified per call, not consumed.
pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(ApiError::NotFound("user"))?;

    // Accounts created through the admin surface have no code until they
    // sign up themselves.
    if user.confirmation_code.is_empty()
        || !codes_match(&user.confirmation_code, &req.confirmation_code)
    {
        return Err(ApiError::validation("invalid confirmation code"));
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {e}", user.id)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;
    Ok(Json(TokenResponse { token }))
}

fn create_token(secret: &str, user_id: Uuid, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}

/// Constant-acceptance comparison: the scan never short-circuits on the
/// first differing byte.
fn codes_match(stored: &str, supplied: &str) -> bool {
    if stored.len() != supplied.len() {
        return false;
    }
    stored
        .bytes()
        .zip(supplied.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
