use axum::Router;
use axum::routing::{delete, get, post};

use crate::auth::AppState;
use crate::{auth, catalog, comments, reviews, titles, users};

/// Full route table, mounted under /api/v1. Layers (trace, CORS) are the
/// binary's concern.
pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/token", post(auth::token))
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route("/categories/{slug}", delete(catalog::delete_category))
        .route("/genres", get(catalog::list_genres).post(catalog::create_genre))
        .route("/genres/{slug}", delete(catalog::delete_genre))
        .route("/titles", get(titles::list_titles).post(titles::create_title))
        .route(
            "/titles/{title_id}",
            get(titles::get_title)
                .patch(titles::patch_title)
                .delete(titles::delete_title),
        )
        .route(
            "/titles/{title_id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(reviews::get_review)
                .patch(reviews::patch_review)
                .delete(reviews::delete_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(comments::get_comment)
                .patch(comments::patch_comment)
                .delete(comments::delete_comment),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/me", get(users::me).patch(users::patch_me))
        .route(
            "/users/{username}",
            get(users::get_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        );

    Router::new().nest("/api/v1", v1).with_state(state)
}
