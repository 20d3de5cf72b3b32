//! Service layer: all business rules and persistence access live here.
//! Handlers stay thin and translate between HTTP and these services.

pub mod auth_service;
pub mod image_service;
pub mod posting_service;
pub mod user_service;
