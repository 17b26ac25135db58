use std::collections::HashMap;

use axum::http::{Method, StatusCode};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use laurel_db::DbError;
use laurel_db::models::TitleRow;
use laurel_db::queries::TitleFilter;
use laurel_types::api::{CreateTitleRequest, NamedSlug, TitleResponse, UpdateTitleRequest};

use crate::auth::AppState;
use crate::catalog::{MAX_PAGE, default_limit};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::policy::{self, Target};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct TitleListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub category: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub name: Option<String>,
}

fn to_response(row: TitleRow, genre: Vec<NamedSlug>) -> TitleResponse {
    TitleResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt title id '{}': {e}", row.id);
            Uuid::default()
        }),
        name: row.name,
        year: row.year as i32,
        description: row.description,
        genre,
        category: row
            .category_name
            .zip(row.category_slug)
            .map(|(name, slug)| NamedSlug { name, slug }),
        rating: row.rating,
    }
}

fn resolve_category(state: &AppState, slug: &str) -> Result<String, ApiError> {
    Ok(state
        .db
        .get_category_by_slug(slug)?
        .ok_or_else(|| ApiError::validation(format!("unknown category slug '{slug}'")))?
        .id)
}

fn resolve_genres(state: &AppState, slugs: &[String]) -> Result<Vec<String>, ApiError> {
    slugs
        .iter()
        .map(|slug| {
            Ok(state
                .db
                .get_genre_by_slug(slug)?
                .ok_or_else(|| ApiError::validation(format!("unknown genre slug '{slug}'")))?
                .id)
        })
        .collect()
}

fn genres_of(state: &AppState, title_id: &str) -> Result<Vec<NamedSlug>, ApiError> {
    let rows = state.db.genres_for_titles(&[title_id.to_string()])?;
    Ok(rows
        .into_iter()
        .map(|g| NamedSlug { name: g.name, slug: g.slug })
        .collect())
}

pub async fn list_titles(
    State(state): State<AppState>,
    Query(query): Query<TitleListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let filter = TitleFilter {
        category: query.category,
        genre: query.genre,
        year: query.year,
        name: query.name,
    };
    let limit = query.limit.min(MAX_PAGE);
    let offset = query.offset;

    // The aggregate JOIN is the heaviest read; run it off the async runtime.
    let (rows, genre_rows) = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_titles(&filter, limit, offset)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let genre_rows = db.db.genres_for_titles(&ids)?;
        Ok::<_, ApiError>((rows, genre_rows))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}")))??;

    let mut genre_map: HashMap<String, Vec<NamedSlug>> = HashMap::new();
    for g in genre_rows {
        genre_map
            .entry(g.title_id)
            .or_default()
            .push(NamedSlug { name: g.name, slug: g.slug });
    }

    let titles: Vec<TitleResponse> = rows
        .into_iter()
        .map(|row| {
            let genres = genre_map.remove(&row.id).unwrap_or_default();
            to_response(row, genres)
        })
        .collect();

    Ok(Json(titles))
}

pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = title_id.to_string();
    let row = state.db.get_title(&id)?.ok_or(ApiError::NotFound("title"))?;
    let genres = genres_of(&state, &id)?;
    Ok(Json(to_response(row, genres)))
}

pub async fn create_title(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Json(req): Json<CreateTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Catalog)?;
    validate::name(&req.name)?;
    validate::year(req.year)?;

    let category_id = req
        .category
        .as_deref()
        .map(|slug| resolve_category(&state, slug))
        .transpose()?;
    let genre_ids = resolve_genres(&state, &req.genre)?;

    let id = Uuid::new_v4().to_string();
    state.db.create_title(
        &id,
        &req.name,
        i64::from(req.year),
        req.description.as_deref(),
        category_id.as_deref(),
        &genre_ids,
    )?;

    let row = state
        .db
        .get_title(&id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("title missing after insert")))?;
    let genres = genres_of(&state, &id)?;
    Ok((StatusCode::CREATED, Json(to_response(row, genres))))
}

pub async fn patch_title(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path(title_id): Path<Uuid>,
    Json(req): Json<UpdateTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Catalog)?;

    let id = title_id.to_string();
    let existing = state.db.get_title(&id)?.ok_or(ApiError::NotFound("title"))?;

    if let Some(name) = &req.name {
        validate::name(name)?;
    }
    if let Some(year) = req.year {
        validate::year(year)?;
    }

    let category_id = match req.category.as_deref() {
        Some(slug) => Some(resolve_category(&state, slug)?),
        None => existing.category_id.clone(),
    };
    let genre_ids = match &req.genre {
        Some(slugs) => Some(resolve_genres(&state, slugs)?),
        None => None,
    };

    let name = req.name.unwrap_or(existing.name);
    let year = req.year.map(i64::from).unwrap_or(existing.year);
    let description = req.description.or(existing.description);

    state.db.update_title(
        &id,
        &name,
        year,
        description.as_deref(),
        category_id.as_deref(),
        genre_ids.as_deref(),
    )?;

    let row = state
        .db
        .get_title(&id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("title missing after update")))?;
    let genres = genres_of(&state, &id)?;
    Ok(Json(to_response(row, genres)))
}

pub async fn delete_title(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(Some(&actor), &method, Target::Catalog)?;
    state.db.delete_title(&title_id.to_string()).map_err(|e| match e {
        DbError::NotFound => ApiError::NotFound("title"),
        other => other.into(),
    })?;
    Ok(StatusCode::NO_CONTENT)
}
