//! Authentication strategies as axum extractors.
//!
//! A route opts into a strategy at composition time by taking `BasicUser`
//! or `AuthUser` as a handler argument; public routes simply take neither.
//! Both strategies yield the authenticated user's full record and mutate
//! nothing.

use crate::{errors::ApiError, models::user::User, state::AppState};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose};

/// Principal authenticated via `Authorization: Basic` credentials.
pub struct BasicUser(pub User);

/// Principal authenticated via `Authorization: Bearer` token.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for BasicUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (username, password) =
            parse_basic(auth_header(parts)?).ok_or(ApiError::Authentication)?;
        let user = state.auth.authenticate_basic(&username, &password).await?;
        Ok(BasicUser(user))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = auth_header(parts)?
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Authentication)?;
        let user = state.auth.authenticate_bearer(token.trim()).await?;
        Ok(AuthUser(user))
    }
}

fn auth_header(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Authentication)
}

/// Decode `Basic base64(user:pass)`. Returns None on any malformation.
fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_basic_header() {
        let encoded = general_purpose::STANDARD.encode("mattimei:MKO098UHB");
        let parsed = parse_basic(&format!("Basic {encoded}"));
        assert_eq!(
            parsed,
            Some(("mattimei".to_string(), "MKO098UHB".to_string()))
        );
    }

    #[test]
    fn password_may_contain_colons() {
        let encoded = general_purpose::STANDARD.encode("user:pa:ss");
        let parsed = parse_basic(&format!("Basic {encoded}"));
        assert_eq!(parsed, Some(("user".to_string(), "pa:ss".to_string())));
    }

    #[test]
    fn rejects_wrong_scheme_and_bad_encoding() {
        assert!(parse_basic("Bearer abc").is_none());
        assert!(parse_basic("Basic not-base64!!").is_none());

        let no_colon = general_purpose::STANDARD.encode("just-a-user");
        assert!(parse_basic(&format!("Basic {no_colon}")).is_none());
    }
}
