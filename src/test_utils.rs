#[cfg(test)]
pub mod test_utils {
    use std::sync::Arc;

    use crate::config::{AppConfig, RateLimitConfig};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use axum::http::HeaderValue;
    use axum_test::TestServer;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::{Value, json};
    use tracing_subscriber::EnvFilter;

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Cheap bcrypt and a rate limit no test reaches by accident.
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.bcrypt_cost = 4;
        config.rate_limit.max_requests = 10_000;
        config
    }

    /// Create AppState for testing
    pub async fn setup_test_app_state_with(config: AppConfig) -> AppState {
        let db = setup_test_db().await;
        AppState::new(db, Arc::new(config))
    }

    pub async fn setup_test_app_state() -> AppState {
        setup_test_app_state_with(test_config()).await
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The filter comes from `RUST_LOG`, defaulting to `warn`. Only the first
    /// call installs the subscriber.
    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        init_test_tracing();
        create_router(setup_test_app_state().await)
    }

    pub async fn setup_test_server() -> TestServer {
        TestServer::new(setup_test_app().await).unwrap()
    }

    pub async fn setup_test_server_with_limit(
        max_requests: u64,
        trust_forwarded_for: bool,
    ) -> TestServer {
        init_test_tracing();
        let mut config = test_config();
        config.rate_limit = RateLimitConfig {
            window_secs: 60,
            max_requests,
            trust_forwarded_for,
        };
        TestServer::new(create_router(setup_test_app_state_with(config).await)).unwrap()
    }

    /// Register `username` and return its bearer token.
    pub async fn register(server: &TestServer, username: &str) -> String {
        let response = server
            .post("/api/auth/register")
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "pw123456",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        body["data"]["token"]
            .as_str()
            .expect("token in register response")
            .to_string()
    }

    /// `Authorization` header value for `token`.
    pub fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }
}
