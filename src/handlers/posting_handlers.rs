//! Posting handlers. Reads and search are public; create requires a bearer
//! principal; update and delete are owner-only, with the existence lookup
//! ahead of the ownership check.

use crate::{
    errors::ApiError,
    extractors::AuthUser,
    models::posting::PostingView,
    services::{
        auth_service::authorize,
        posting_service::{NewPosting, PostingPatch, SearchFilters, SearchResult},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};

/// `POST /postings` — create a posting owned by the requesting principal.
pub async fn create_posting(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<NewPosting>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::validation("Incorrect request body"))?;
    let view = state.postings.create(&user, req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /postings/{slug}` — public read.
pub async fn get_posting(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostingView>, ApiError> {
    let posting = state.postings.get_by_slug(&slug).await?;
    Ok(Json(state.postings.view(&posting).await?))
}

/// `GET /postings?category&city&country&startDate&endDate&page` — public
/// filtered search, fixed page size of 10.
pub async fn search_postings(
    State(state): State<AppState>,
    query: Result<Query<SearchFilters>, QueryRejection>,
) -> Result<Json<SearchResult>, ApiError> {
    let Query(filters) = query.map_err(|_| ApiError::validation("Invalid search query"))?;
    Ok(Json(state.postings.search(filters).await?))
}

/// `PUT /postings/{slug}` — owner-only shallow merge update.
pub async fn update_posting(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AuthUser(user): AuthUser,
    payload: Result<Json<PostingPatch>, JsonRejection>,
) -> Result<Json<PostingView>, ApiError> {
    let Json(patch) = payload.map_err(|_| ApiError::validation("Incorrect request body"))?;
    let posting = state.postings.get_by_slug(&slug).await?;
    authorize(&user, posting.seller_id)?;
    Ok(Json(state.postings.update(posting, patch).await?))
}

/// `DELETE /postings/{slug}` — owner-only; cascades into attached images.
pub async fn delete_posting(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let posting = state.postings.get_by_slug(&slug).await?;
    authorize(&user, posting.seller_id)?;
    state.postings.delete(&posting).await?;
    Ok((StatusCode::OK, "OK!"))
}
