//! HTTP surface of the service.
//!
//! Only operational endpoints are exposed over HTTP; notes and users are managed through the
//! repositories in [`crate::db`].
//!
//! - `GET /` - liveness
//! - `GET /db/health` - configured provider and whether the database answers
//!
//! OpenAPI documentation is served at `/docs`, with the raw document at `/openapi.json`.

pub mod handlers;
pub mod models;
