//! # notesd: note storage service
//!
//! `notesd` keeps short text notes owned by users in a relational store. The library exposes
//! repositories for both entities and a small HTTP server that reports liveness and database
//! reachability.
//!
//! ## Architecture
//!
//! The **database layer** ([`db`]) uses the repository pattern. [`db::handlers::Users`] and
//! [`db::handlers::Notes`] each borrow a single connection for the duration of a unit of work and
//! implement [`db::handlers::Repository`]. Writes stamp `created_at` / `updated_at` through
//! [`db::timestamps`], list operations share the clamped pagination in [`db::pagination`], and
//! deleting a user cascades to their notes through the schema's foreign key.
//!
//! The **HTTP layer** ([`api`]) is built on [Axum](https://github.com/tokio-rs/axum) and only carries
//! operational endpoints: `GET /` and `GET /db/health`, plus OpenAPI docs at `/docs` and optional
//! Prometheus metrics at `/internal/metrics`.
//!
//! Storage is SQLite, selected and located through [`config`]. Any other provider name is rejected
//! before the server starts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use notesd::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = notesd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     notesd::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Using the repositories directly
//!
//! ```no_run
//! # use sqlx::SqlitePool;
//! use notesd::db::handlers::{Notes, Repository, Users};
//! use notesd::db::models::{notes::NoteCreateDBRequest, users::UserCreateDBRequest};
//!
//! # async fn example(pool: SqlitePool) -> anyhow::Result<()> {
//! notesd::migrator().run(&pool).await?;
//!
//! let mut conn = pool.acquire().await?;
//! let alice = Users::new(&mut conn)
//!     .create(&UserCreateDBRequest {
//!         username: "alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!         password_hash: "<hash>".to_string(),
//!     })
//!     .await?;
//!
//! let note = Notes::new(&mut conn)
//!     .create(&NoteCreateDBRequest {
//!         user_id: alice.id,
//!         title: None,
//!         content: "buy milk".to_string(),
//!     })
//!     .await?;
//! # let _ = note;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{db::errors::DbError, openapi::ApiDoc};
use axum::{Json, Router, routing::get};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{NoteId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
}

/// Get the notesd database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the configured database, creating it if needed, and bring the schema up to date.
///
/// Fails with [`errors::Error::UnsupportedProvider`] for anything but SQLite, before any
/// connection is attempted.
///
/// In-memory databases only live as long as at least one pooled connection stays open.
#[instrument(skip_all, err)]
pub async fn setup_database(config: &Config) -> errors::Result<SqlitePool> {
    let provider = config.database.provider()?;
    let options = config.database.connect_options()?;
    info!("Using {} database", provider);

    let settings = &config.database.pool;
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout())
        .idle_timeout(settings.idle_timeout())
        .max_lifetime(settings.max_lifetime())
        .connect_with(options)
        .await
        .map_err(DbError::from)?;

    migrator().run(&pool).await?;
    debug!("Database migrations applied");

    Ok(pool)
}

/// Any origin, method and header, with credentials. Origin, methods and headers are mirrored from
/// the request since a literal `*` is not allowed alongside credentials.
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application router: health endpoints, OpenAPI docs, optional metrics, CORS and
/// request tracing.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> Router {
    let router = Router::new()
        .route("/", get(api::handlers::health::health))
        .route("/db/health", get(api::handlers::health::db_health))
        .with_state(state.clone())
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer());

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance, opening and migrating the configured database
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application over an existing pool. The pool's schema must already be migrated.
    pub async fn new_with_pool(config: Config, pool: Option<SqlitePool>) -> anyhow::Result<Self> {
        debug!("Starting notesd with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => setup_database(&config).await?,
        };

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state);

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("notesd listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
