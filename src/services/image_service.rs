//! Image attachments: per-posting cap of four, raw-byte retrieval, and
//! detachment guarded against cross-posting requests.

use crate::{
    errors::ApiError,
    models::{image::Image, posting::Posting, user::User},
    services::auth_service::authorize,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Hard cap on attached images per posting.
pub const MAX_IMAGES_PER_POSTING: i64 = 4;

/// Upload size cap, matching the transport-level limit of the upload field.
pub const MAX_IMAGE_BYTES: usize = 1_000_000;

const DEFAULT_IMAGE_NAME: &str = "image.jpg";

#[derive(Clone)]
pub struct ImageService {
    db: Arc<SqlitePool>,
}

impl ImageService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Attach a payload to the posting, appending at the end of its list.
    ///
    /// Caller has already verified ownership; the cap is enforced here.
    pub async fn attach(
        &self,
        posting: &Posting,
        name: Option<String>,
        content_type: String,
        data: Vec<u8>,
    ) -> Result<Uuid, ApiError> {
        let (count, next_position) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(MAX(position) + 1, 0) FROM images WHERE posting_id = ?",
        )
        .bind(posting.id)
        .fetch_one(&*self.db)
        .await?;

        if count >= MAX_IMAGES_PER_POSTING {
            return Err(ApiError::ImageLimit);
        }

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO images (id, posting_id, name, content_type, data, position, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(posting.id)
        .bind(name.unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string()))
        .bind(&content_type)
        .bind(data)
        .bind(next_position)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Image, ApiError> {
        sqlx::query_as::<_, Image>(
            "SELECT id, posting_id, name, content_type, data, position, created_at
             FROM images WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ApiError::NotFound("Image not found"))
    }

    /// Detach an image addressed as `/postings/{slug}/images/{id}`.
    ///
    /// Order matters: a missing image is NotFound; an image whose owning
    /// posting does not match the URL slug is Unauthorized (cross-posting
    /// deletion guard); a requester who does not own that posting is
    /// Unauthorized. Only then is the row removed. The back-reference lives
    /// on the image row, so the delete also drops the posting's list entry.
    pub async fn detach(
        &self,
        requester: &User,
        slug: &str,
        image_id: Uuid,
    ) -> Result<(), ApiError> {
        let image = self.get(image_id).await?;

        let owning = sqlx::query_as::<_, (String, Uuid)>(
            "SELECT slug, seller_id FROM postings WHERE id = ?",
        )
        .bind(image.posting_id)
        .fetch_optional(&*self.db)
        .await?;
        let (posting_slug, seller_id) =
            owning.ok_or(ApiError::NotFound("Posting not found"))?;

        if posting_slug != slug {
            return Err(ApiError::Unauthorized);
        }
        authorize(requester, seller_id)?;

        sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(image.id)
            .execute(&*self.db)
            .await?;

        Ok(())
    }
}
