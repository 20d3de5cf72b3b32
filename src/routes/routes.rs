//! Defines routes for the marketplace API.
//!
//! ## Structure
//! - **User endpoints**
//!   - `POST   /users` — register (public)
//!   - `GET    /users/{id}` — own profile (bearer, self-only)
//!   - `PUT    /users/{id}` — update profile (bearer, self-only)
//!   - `DELETE /users/{id}` — delete account + cascade (bearer, self-only)
//!   - `GET    /users/{id}/postings` — own postings (bearer, self-only)
//!   - `GET    /users/{id}/postings/{slug}` — one own posting (bearer, self-only)
//!
//! - **Auth endpoint**
//!   - `GET    /auth/login` — Basic credentials in, bearer token out
//!
//! - **Posting endpoints**
//!   - `POST   /postings` — create (bearer)
//!   - `GET    /postings` — public search (?category&city&country&startDate&endDate&page)
//!   - `GET    /postings/{slug}` — public read
//!   - `PUT    /postings/{slug}` — update (bearer, owner-only)
//!   - `DELETE /postings/{slug}` — delete + image cascade (bearer, owner-only)
//!
//! - **Image endpoints**
//!   - `POST   /postings/{slug}/images` — multipart upload (bearer, owner-only)
//!   - `DELETE /postings/{slug}/images/{id}` — detach (bearer, owner-only)
//!   - `GET    /images/{id}` — public raw bytes
//!
//! Authentication strategy is chosen per route by the extractor each handler
//! takes, not by branching inside handlers.

use crate::{
    handlers::{
        auth_handlers::login,
        health_handlers::{healthz, readyz},
        image_handlers::{add_image, get_image, remove_image},
        posting_handlers::{
            create_posting, delete_posting, get_posting, search_postings, update_posting,
        },
        user_handlers::{
            delete_user, get_user, get_user_posting, list_user_postings, register_user,
            update_user,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for the whole API surface.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // User routes
        .route("/users", post(register_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/postings", get(list_user_postings))
        .route("/users/{id}/postings/{slug}", get(get_user_posting))
        // Auth routes
        .route("/auth/login", get(login))
        // Posting routes
        .route("/postings", post(create_posting).get(search_postings))
        .route(
            "/postings/{slug}",
            get(get_posting).put(update_posting).delete(delete_posting),
        )
        // Image routes
        .route("/postings/{slug}/images", post(add_image))
        .route("/postings/{slug}/images/{id}", delete(remove_image))
        .route("/images/{id}", get(get_image))
}
