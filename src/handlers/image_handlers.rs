//! Image handlers: multipart upload (single "image" field, ≤1MB), public
//! raw-byte retrieval, and owner-only detachment.

use crate::{
    errors::ApiError,
    extractors::AuthUser,
    services::{auth_service::authorize, image_service::MAX_IMAGE_BYTES},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

const UPLOAD_FIELD: &str = "image";

/// `POST /postings/{slug}/images` — attach one image to an owned posting.
pub async fn add_image(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let posting = state.postings.get_by_slug(&slug).await?;
    authorize(&user, posting.seller_id)?;

    let mut upload: Option<(Option<String>, String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("Invalid multipart body"))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::validation("Invalid multipart body"))?;
        upload = Some((name, content_type, data.to_vec()));
        break;
    }

    let (name, content_type, data) =
        upload.ok_or_else(|| ApiError::validation("Image file missing"))?;
    if data.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::validation("Image exceeds the 1MB size limit"));
    }

    let id = state.images.attach(&posting, name, content_type, data).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// `GET /images/{id}` — public raw binary pass-through with the declared
/// content type.
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let image = state.images.get(id).await?;

    let mut response = Response::new(Body::from(image.data));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&image.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    Ok(response)
}

/// `DELETE /postings/{slug}/images/{id}` — owner-only detachment; the
/// slug/ownership checks live in the service.
pub async fn remove_image(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, Uuid)>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    state.images.detach(&user, &slug, id).await?;
    Ok((StatusCode::OK, "OK!"))
}
