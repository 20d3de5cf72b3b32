//! Core data models for the marketplace service.
//!
//! These entities map to database tables via `sqlx::FromRow` and carry the
//! JSON projections the API exposes (full rows are never serialized as-is;
//! each model offers a projection that strips private fields).

pub mod image;
pub mod posting;
pub mod user;
