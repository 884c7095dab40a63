//! Axum route handlers.

pub mod health;
