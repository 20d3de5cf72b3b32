//! Credential exchange: `GET /auth/login` verifies Basic credentials and
//! answers with a fresh 24h bearer token.

use crate::{errors::ApiError, extractors::BasicUser, state::AppState};
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn login(
    State(state): State<AppState>,
    BasicUser(user): BasicUser,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.auth.issue_token(&user)?;
    Ok(Json(TokenResponse { token }))
}
