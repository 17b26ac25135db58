use axum::http::{Method, StatusCode};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use laurel_db::DbError;
use laurel_db::models::UserRow;
use laurel_types::api::{CreateUserRequest, UpdateUserRequest, UserResponse};
use laurel_types::models::Role;

use crate::auth::AppState;
use crate::catalog::{ListQuery, MAX_PAGE};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::policy::{self, Target};
use crate::validate;

fn to_response(row: UserRow) -> UserResponse {
    let role = Role::parse(&row.role).unwrap_or_else(|| {
        warn!("Unknown role '{}' on user '{}'", row.role, row.username);
        Role::User
    });
    UserResponse {
        username: row.username,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        bio: row.bio,
        role,
    }
}

/// Merge a partial update into the stored row. The self-service surface
/// passes `honor_role = false`: a supplied role is ignored there, not an
/// error, matching a read-only field.
fn apply_update(row: &mut UserRow, req: UpdateUserRequest, honor_role: bool) -> Result<(), ApiError> {
    if let Some(username) = req.username {
        validate::username(&username)?;
        row.username = username;
    }
    if let Some(email) = req.email {
        validate::email(&email)?;
        row.email = email;
    }
    if let Some(first_name) = req.first_name {
        row.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        row.last_name = last_name;
    }
    if let Some(bio) = req.bio {
        row.bio = bio;
    }
    if honor_role {
        if let Some(role) = req.role {
            row.role = role.as_str().to_string();
        }
    }
    Ok(())
}

fn store_update(state: &AppState, row: &UserRow) -> Result<(), ApiError> {
    state
        .db
        .update_user(
            &row.id,
            &row.username,
            &row.email,
            &row.role,
            &row.first_name,
            &row.last_name,
            &row.bio,
        )
        .map_err(|e| match e {
            DbError::Conflict(_) => {
                ApiError::validation("username or email is already registered")
            }
            DbError::NotFound => ApiError::NotFound("user"),
            other => other.into(),
        })
}

// -- Admin surface --

pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Accounts)?;

    let rows = state.db.list_users(
        query.search.as_deref(),
        query.limit.min(MAX_PAGE),
        query.offset,
    )?;
    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Accounts)?;
    validate::username(&req.username)?;
    validate::email(&req.email)?;

    let id = Uuid::new_v4().to_string();
    state
        .db
        .create_user(
            &id,
            &req.username,
            &req.email,
            req.role.as_str(),
            &req.first_name,
            &req.last_name,
            &req.bio,
            "",
        )
        .map_err(|e| match e {
            DbError::Conflict(_) => {
                ApiError::validation("username or email is already registered")
            }
            other => other.into(),
        })?;

    let row = state
        .db
        .get_user_by_id(&id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user missing after insert")))?;
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn get_user(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Accounts)?;

    let row = state
        .db
        .get_user_by_username(&username)?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(to_response(row)))
}

pub async fn patch_user(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path(username): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Accounts)?;

    let mut row = state
        .db
        .get_user_by_username(&username)?
        .ok_or(ApiError::NotFound("user"))?;
    apply_update(&mut row, req, true)?;
    store_update(&state, &row)?;

    Ok(Json(to_response(row)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Accounts)?;

    let row = state
        .db
        .get_user_by_username(&username)?
        .ok_or(ApiError::NotFound("user"))?;
    state.db.delete_user(&row.id)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Self-service surface --

pub async fn me(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_user_by_id(&actor.id.to_string())?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(to_response(row)))
}

pub async fn patch_me(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut row = state
        .db
        .get_user_by_id(&actor.id.to_string())?
        .ok_or(ApiError::Unauthenticated)?;

    apply_update(&mut row, req, false)?;
    store_update(&state, &row)?;

    Ok(Json(to_response(row)))
}
