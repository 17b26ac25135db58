use axum::http::{Method, StatusCode};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use laurel_db::models::CommentRow;
use laurel_types::api::{CommentResponse, CreateCommentRequest, UpdateCommentRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::parse_pub_date;
use crate::policy::{self, Target};
use crate::reviews::PageQuery;
use crate::validate;

fn to_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt comment id '{}': {e}", row.id);
            Uuid::default()
        }),
        text: row.text,
        author: row.author_username,
        pub_date: parse_pub_date(&row.pub_date, "comment", &row.id),
    }
}

/// Comments hang off a review which hangs off a title; a broken link
/// anywhere in that chain is a 404.
fn require_review(state: &AppState, title_id: &Uuid, review_id: &Uuid) -> Result<(), ApiError> {
    state
        .db
        .get_review(&title_id.to_string(), &review_id.to_string())?
        .ok_or(ApiError::NotFound("review"))?;
    Ok(())
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_review(&state, &title_id, &review_id)?;

    let rows = state.db.list_comments(
        &review_id.to_string(),
        query.limit.min(crate::catalog::MAX_PAGE),
        query.offset,
    )?;
    Ok(Json(rows.into_iter().map(to_response).collect::<Vec<_>>()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_review(&state, &title_id, &review_id)?;
    validate::required_text(&req.text, "text")?;

    let id = Uuid::new_v4().to_string();
    let rid = review_id.to_string();
    state
        .db
        .insert_comment(&id, &rid, &actor.id.to_string(), &req.text)?;

    let row = state
        .db
        .get_comment(&rid, &id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("comment missing after insert")))?;
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    require_review(&state, &title_id, &review_id)?;

    let row = state
        .db
        .get_comment(&review_id.to_string(), &comment_id.to_string())?
        .ok_or(ApiError::NotFound("comment"))?;
    Ok(Json(to_response(row)))
}

pub async fn patch_comment(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_review(&state, &title_id, &review_id)?;

    let rid = review_id.to_string();
    let cid = comment_id.to_string();
    let existing = state
        .db
        .get_comment(&rid, &cid)?
        .ok_or(ApiError::NotFound("comment"))?;

    policy::authorize(Some(&actor), &method, Target::UserContent { author_id: &existing.author_id })?;

    if let Some(text) = &req.text {
        validate::required_text(text, "text")?;
    }
    let text = req.text.unwrap_or(existing.text);
    state.db.update_comment(&cid, &text)?;

    let row = state
        .db
        .get_comment(&rid, &cid)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("comment missing after update")))?;
    Ok(Json(to_response(row)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    require_review(&state, &title_id, &review_id)?;

    let existing = state
        .db
        .get_comment(&review_id.to_string(), &comment_id.to_string())?
        .ok_or(ApiError::NotFound("comment"))?;

    policy::authorize(Some(&actor), &method, Target::UserContent { author_id: &existing.author_id })?;

    state.db.delete_comment(&existing.id)?;
    Ok(StatusCode::NO_CONTENT)
}
