//! OpenAPI document for the HTTP surface, served at `/openapi.json` and rendered at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "notesd",
        description = "Notes storage service. Operational endpoints only."
    ),
    paths(
        api::handlers::health::health,
        api::handlers::health::db_health,
    ),
    components(schemas(
        api::models::health::HealthResponse,
        api::models::health::DbHealthResponse,
    )),
    tags(
        (name = "health", description = "Liveness and database reachability"),
    )
)]
pub struct ApiDoc;
