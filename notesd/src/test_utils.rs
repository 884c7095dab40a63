//! Fixtures shared by the unit tests.

use crate::config::{Config, DatabaseConfig, PoolSettings};
use crate::db::handlers::{Notes, Repository, Users};
use crate::db::models::{
    notes::{NoteCreateDBRequest, NoteDBResponse},
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::UserId;
use axum_test::TestServer;
use sqlx::{SqliteConnection, SqlitePool};

pub async fn create_test_app(pool: SqlitePool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            connection_string: "sqlite::memory:".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn user_create_request(username: &str) -> UserCreateDBRequest {
    UserCreateDBRequest {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: "opaque-hash".to_string(),
    }
}

pub async fn create_test_user(conn: &mut SqliteConnection, username: &str) -> UserDBResponse {
    Users::new(conn)
        .create(&user_create_request(username))
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_note(conn: &mut SqliteConnection, user_id: UserId, content: &str) -> NoteDBResponse {
    Notes::new(conn)
        .create(&NoteCreateDBRequest {
            user_id,
            title: None,
            content: content.to_string(),
        })
        .await
        .expect("Failed to create test note")
}
