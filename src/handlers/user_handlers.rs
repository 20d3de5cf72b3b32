//! User account handlers. Everything except registration is bearer-only and
//! self-only: the existence lookup runs first so a missing user reports 404
//! before the ownership check can report 401.

use crate::{
    errors::ApiError,
    extractors::AuthUser,
    models::{posting::PostingView, user::UserPublic},
    services::{
        auth_service::authorize,
        user_service::{NewUser, UserPatch},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// `POST /users` — open registration.
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::validation("Incorrect request body"))?;
    let user = state.users.create(req).await?;
    Ok((StatusCode::CREATED, Json(user.public())))
}

/// `GET /users/{id}` — own profile only.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AuthUser(principal): AuthUser,
) -> Result<Json<UserPublic>, ApiError> {
    let user = state.users.get(id).await?;
    authorize(&principal, user.id)?;
    Ok(Json(user.public()))
}

/// `PUT /users/{id}` — partial profile update, own profile only.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AuthUser(principal): AuthUser,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<UserPublic>, ApiError> {
    let Json(patch) = payload.map_err(|_| ApiError::validation("Incorrect request body"))?;
    let user = state.users.get(id).await?;
    authorize(&principal, user.id)?;
    let updated = state.users.update(user, patch).await?;
    Ok(Json(updated.public()))
}

/// `DELETE /users/{id}` — deletes the account and cascades into owned
/// postings and their images.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AuthUser(principal): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.get(id).await?;
    authorize(&principal, user.id)?;
    state.users.delete(&user).await?;
    Ok((StatusCode::OK, "OK!"))
}

/// `GET /users/{id}/postings` — the user's own postings.
pub async fn list_user_postings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<PostingView>>, ApiError> {
    let user = state.users.get(id).await?;
    authorize(&principal, user.id)?;

    let postings = state.users.list_postings(user.id).await?;
    let mut views = Vec::with_capacity(postings.len());
    for posting in &postings {
        views.push(state.postings.view(posting).await?);
    }
    Ok(Json(views))
}

/// `GET /users/{id}/postings/{slug}` — one of the user's own postings.
pub async fn get_user_posting(
    State(state): State<AppState>,
    Path((id, slug)): Path<(Uuid, String)>,
    AuthUser(principal): AuthUser,
) -> Result<Json<PostingView>, ApiError> {
    let user = state.users.get(id).await?;
    authorize(&principal, user.id)?;

    let posting = state.users.get_posting(user.id, &slug).await?;
    Ok(Json(state.postings.view(&posting).await?))
}
