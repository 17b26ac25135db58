use axum::http::{Method, StatusCode};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use laurel_db::DbError;
use laurel_db::models::SlugRow;
use laurel_types::api::NamedSlug;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::policy::{self, Target};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    /// Exact-match name search (exact-match username for the user listing).
    pub search: Option<String>,
}

pub(crate) fn default_limit() -> u32 {
    50
}

pub(crate) const MAX_PAGE: u32 = 200;

fn to_named_slug(row: SlugRow) -> NamedSlug {
    NamedSlug {
        name: row.name,
        slug: row.slug,
    }
}

// -- Categories --

pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_categories(
        query.search.as_deref(),
        query.limit.min(MAX_PAGE),
        query.offset,
    )?;
    Ok(Json(rows.into_iter().map(to_named_slug).collect::<Vec<_>>()))
}

pub async fn create_category(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Json(req): Json<NamedSlug>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Catalog)?;
    validate::name(&req.name)?;
    validate::slug(&req.slug)?;

    let id = Uuid::new_v4().to_string();
    state.db.create_category(&id, &req.name, &req.slug).map_err(|e| match e {
        DbError::Conflict(_) => ApiError::validation("slug is already in use"),
        other => other.into(),
    })?;

    Ok((StatusCode::CREATED, Json(req)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Catalog)?;
    state.db.delete_category(&slug).map_err(|e| match e {
        DbError::NotFound => ApiError::NotFound("category"),
        other => other.into(),
    })?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Genres --

pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_genres(
        query.search.as_deref(),
        query.limit.min(MAX_PAGE),
        query.offset,
    )?;
    Ok(Json(rows.into_iter().map(to_named_slug).collect::<Vec<_>>()))
}

pub async fn create_genre(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Json(req): Json<NamedSlug>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Catalog)?;
    validate::name(&req.name)?;
    validate::slug(&req.slug)?;

    let id = Uuid::new_v4().to_string();
    state.db.create_genre(&id, &req.name, &req.slug).map_err(|e| match e {
        DbError::Conflict(_) => ApiError::validation("slug is already in use"),
        other => other.into(),
    })?;

    Ok((StatusCode::CREATED, Json(req)))
}

pub async fn delete_genre(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Catalog)?;
    state.db.delete_genre(&slug).map_err(|e| match e {
        DbError::NotFound => ApiError::NotFound("genre"),
        other => other.into(),
    })?;
    Ok(StatusCode::NO_CONTENT)
}
