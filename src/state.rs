//! Shared application state handed to every handler.

use crate::services::{
    auth_service::AuthService, image_service::ImageService, posting_service::PostingService,
    user_service::UserService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// One clone per request; everything inside is cheaply cloneable and
/// read-only after startup apart from the connection pool.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub auth: AuthService,
    pub users: UserService,
    pub postings: PostingService,
    pub images: ImageService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, jwt_secret: &str) -> Self {
        Self {
            auth: AuthService::new(db.clone(), jwt_secret),
            users: UserService::new(db.clone()),
            postings: PostingService::new(db.clone()),
            images: ImageService::new(db.clone()),
            db,
        }
    }
}
