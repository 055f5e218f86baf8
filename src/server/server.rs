use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::catalog::CatalogManager;
use crate::media::MediaStore;
use crate::user::UserManager;
use tower_http::services::ServeDir;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::metrics::{init_catalog_metrics, metrics_handler};
use super::routes::make_api_routes;
use super::{expose_error_details, log_requests, state::ServerState, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let days = total_seconds / 86400;
    let hours = (total_seconds % 86400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    Json(ServerStats {
        uptime: format_uptime(Instant::now().duration_since(state.start_time)),
        hash: env!("GIT_HASH").to_string(),
    })
}

pub fn make_app(
    config: ServerConfig,
    catalog_manager: CatalogManager,
    user_manager: UserManager,
    media_store: Arc<dyn MediaStore>,
) -> Router {
    let uploads_service = ServeDir::new(media_store.uploads_dir());
    let body_limit = config.upload_limits.max_request_bytes();
    let expose_details = config.exposes_error_details();
    let state = ServerState::new(config, catalog_manager, user_manager, media_store);

    let mut app: Router<ServerState> = Router::new()
        .route("/", get(home))
        .nest("/api", make_api_routes())
        .nest_service("/uploads", uploads_service)
        .layer(DefaultBodyLimit::max(body_limit));

    if expose_details {
        app = app.layer(middleware::from_fn(expose_error_details));
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    app.with_state(state)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for the shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

pub async fn run_server(
    config: ServerConfig,
    catalog_manager: CatalogManager,
    user_manager: UserManager,
    media_store: Arc<dyn MediaStore>,
) -> Result<()> {
    init_catalog_metrics(&catalog_manager.counts()?);

    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, catalog_manager, user_manager, media_store);

    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Cannot bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            tracing::error!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Cannot bind port {}", port))?;
    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::SqliteCatalogStore;
    use crate::config::Environment;
    use crate::media::{FileMediaStore, UploadLimits};
    use crate::user::{Sex, SqliteUserStore, TokenIssuer, UserRole};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    struct TestApp {
        app: Router,
        admin_token: String,
        user_token: String,
        _media_dir: TempDir,
    }

    fn make_test_app(environment: Environment) -> TestApp {
        make_test_app_with(
            environment,
            Arc::new(SqliteCatalogStore::in_memory().unwrap()),
        )
    }

    fn make_test_app_with(
        environment: Environment,
        catalog_store: Arc<SqliteCatalogStore>,
    ) -> TestApp {
        let media_dir = TempDir::new().unwrap();
        let user_store = Arc::new(SqliteUserStore::in_memory().unwrap());
        let user_manager = UserManager::new(
            user_store.clone(),
            catalog_store.clone(),
            TokenIssuer::new("test secret", Duration::from_secs(3600)),
        );
        user_manager
            .create_user("root", "rootpw", UserRole::Admin, Sex::Other)
            .unwrap();
        user_manager
            .create_user("listener", "listenerpw", UserRole::User, Sex::Other)
            .unwrap();
        let admin_token = user_manager
            .login(Some("root"), Some("rootpw"))
            .unwrap()
            .token;
        let user_token = user_manager
            .login(Some("listener"), Some("listenerpw"))
            .unwrap()
            .token;

        let media_store =
            Arc::new(FileMediaStore::new(media_dir.path(), UploadLimits::default()).unwrap());
        let config = ServerConfig {
            environment,
            requests_logging_level: crate::server::RequestsLoggingLevel::None,
            ..Default::default()
        };
        TestApp {
            app: make_app(
                config,
                CatalogManager::new(catalog_store, user_store),
                user_manager,
                media_store,
            ),
            admin_token,
            user_token,
            _media_dir: media_dir,
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn responds_unauthorized_on_protected_routes() {
        let test_app = make_test_app(Environment::Production);

        let protected_routes = vec![
            ("GET", "/api/auth/profile"),
            ("PUT", "/api/auth/change-password"),
            ("GET", "/api/users"),
            ("GET", "/api/users/stats"),
            ("GET", "/api/users/favorites"),
            ("POST", "/api/users/favorites/65a1f0c2e4b0a1b2c3d4e5f6"),
            ("POST", "/api/artists"),
            ("POST", "/api/albums"),
            ("POST", "/api/songs"),
            ("POST", "/api/playlists"),
            ("DELETE", "/api/playlists/65a1f0c2e4b0a1b2c3d4e5f6"),
        ];

        for (method, route) in protected_routes.into_iter() {
            let response = test_app
                .app
                .clone()
                .oneshot(request(method, route, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, route);
        }

        let response = test_app
            .app
            .clone()
            .oneshot(request("GET", "/api/users", Some("not a token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn responds_forbidden_on_admin_routes_for_users() {
        let test_app = make_test_app(Environment::Production);
        let token = Some(test_app.user_token.as_str());

        for (method, route) in [
            ("GET", "/api/users"),
            ("GET", "/api/users/stats"),
            ("POST", "/api/artists"),
            ("DELETE", "/api/albums/65a1f0c2e4b0a1b2c3d4e5f6"),
        ] {
            let response = test_app
                .app
                .clone()
                .oneshot(request(method, route, token))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, route);
        }

        let response = test_app
            .app
            .clone()
            .oneshot(request("GET", "/api/users", Some(&test_app.admin_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn public_reads_need_no_token() {
        let test_app = make_test_app(Environment::Production);
        for route in [
            "/",
            "/api/artists",
            "/api/songs",
            "/api/songs/latest",
            "/api/albums?page=1&limit=5",
            "/api/albums/latest",
            "/api/playlists",
            "/api/playlists/latest",
        ] {
            let response = test_app
                .app
                .clone()
                .oneshot(request("GET", route, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", route);
        }
    }

    #[tokio::test]
    async fn bad_query_strings_are_validation_errors() {
        let test_app = make_test_app(Environment::Production);
        for route in [
            "/api/albums?page=0",
            "/api/albums?limit=abc",
            "/api/songs?sort=colour",
        ] {
            let response = test_app
                .app
                .clone()
                .oneshot(request("GET", route, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", route);
        }
    }

    async fn internal_error_body(environment: Environment) -> serde_json::Value {
        let db_dir = TempDir::new().unwrap();
        let db_path = db_dir.path().join("catalog.db");
        let catalog_store = Arc::new(SqliteCatalogStore::new(&db_path).unwrap());
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute_batch("DROP TABLE artists;")
            .unwrap();
        let test_app = make_test_app_with(environment, catalog_store);

        let response = test_app
            .app
            .clone()
            .oneshot(request("GET", "/api/artists", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_errors_are_verbose_only_in_development() {
        let body = internal_error_body(Environment::Development).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body["error"]
            .as_str()
            .is_some_and(|detail| detail.contains("artists")));

        let body = internal_error_body(Environment::Production).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("error").is_none());
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90061)), "1d 01:01:01");
    }
}
