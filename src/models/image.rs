//! Represents an image attached to a posting.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A single image record, payload included.
///
/// Payloads are capped at 1 MB by the upload handler, so holding the bytes
/// in the row (and in memory) is fine.
#[derive(Clone, FromRow, Debug)]
pub struct Image {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Back-reference to the owning posting.
    pub posting_id: Uuid,

    /// Original filename, or "image.jpg" when none was supplied.
    pub name: String,

    /// Declared MIME type, echoed back on retrieval.
    pub content_type: String,

    /// Raw payload bytes.
    pub data: Vec<u8>,

    /// Position within the posting's ordered image list.
    pub position: i64,

    pub created_at: DateTime<Utc>,
}
