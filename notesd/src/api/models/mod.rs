//! Response bodies for the HTTP endpoints.

pub mod health;
