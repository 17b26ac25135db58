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
use laurel_db::models::ReviewRow;
use laurel_types::api::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest};

use crate::auth::AppState;
use crate::catalog::{MAX_PAGE, default_limit};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::parse_pub_date;
use crate::policy::{self, Target};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn to_response(row: ReviewRow) -> ReviewResponse {
    ReviewResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt review id '{}': {e}", row.id);
            Uuid::default()
        }),
        text: row.text,
        author: row.author_username,
        score: row.score,
        pub_date: parse_pub_date(&row.pub_date, "review", &row.id),
    }
}

fn require_title(state: &AppState, title_id: &str) -> Result<(), ApiError> {
    if state.db.title_exists(title_id)? {
        Ok(())
    } else {
        Err(ApiError::NotFound("title"))
    }
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tid = title_id.to_string();
    require_title(&state, &tid)?;

    let db = state.clone();
    let limit = query.limit.min(MAX_PAGE);
    let offset = query.offset;
    let rows = tokio::task::spawn_blocking(move || db.db.list_reviews(&tid, limit, offset))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}")))??;

    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn create_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(title_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tid = title_id.to_string();
    require_title(&state, &tid)?;
    validate::required_text(&req.text, "text")?;
    validate::score(req.score)?;

    let author_id = actor.id.to_string();

    // Pre-check for a friendly message; the UNIQUE constraint below is the
    // authority when two submissions race.
    if state.db.author_has_review(&tid, &author_id)? {
        return Err(ApiError::validation("you have already reviewed this title"));
    }

    let id = Uuid::new_v4().to_string();
    state
        .db
        .insert_review(&id, &tid, &author_id, &req.text, req.score)
        .map_err(|e| match e {
            DbError::Conflict(_) => {
                ApiError::validation("you have already reviewed this title")
            }
            other => other.into(),
        })?;

    let row = state
        .db
        .get_review(&tid, &id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("review missing after insert")))?;
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_review(&title_id.to_string(), &review_id.to_string())?
        .ok_or(ApiError::NotFound("review"))?;
    Ok(Json(to_response(row)))
}

pub async fn patch_review(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tid = title_id.to_string();
    let rid = review_id.to_string();
    let existing = state
        .db
        .get_review(&tid, &rid)?
        .ok_or(ApiError::NotFound("review"))?;

    policy::authorize(Some(&actor), &method, Target::UserContent { author_id: &existing.author_id })?;

    if let Some(text) = &req.text {
        validate::required_text(text, "text")?;
    }
    if let Some(score) = req.score {
        validate::score(score)?;
    }

    let text = req.text.unwrap_or(existing.text);
    let score = req.score.unwrap_or(existing.score);
    state.db.update_review(&rid, &text, score)?;

    let row = state
        .db
        .get_review(&tid, &rid)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("review missing after update")))?;
    Ok(Json(to_response(row)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state
        .db
        .get_review(&title_id.to_string(), &review_id.to_string())?
        .ok_or(ApiError::NotFound("review"))?;

    policy::authorize(Some(&actor), &method, Target::UserContent { author_id: &existing.author_id })?;

    state.db.delete_review(&existing.id)?;
    Ok(StatusCode::NO_CONTENT)
}
