//! API response models for health endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct HealthResponse {
    /// Always "Healthy" while the process is serving
    #[schema(example = "Healthy")]
    pub message: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            message: "Healthy".to_string(),
        }
    }
}

/// Database reachability response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DbHealthResponse {
    /// Provider name as configured
    #[schema(example = "Sqlite")]
    pub provider: String,
    /// Whether a trivial query succeeded
    pub connected: bool,
}
