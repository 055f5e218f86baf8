//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases and upload directory.

use super::constants::*;
use super::fixtures::{create_test_stores, token_issuer, SeededCatalog};
use music_catalog_server::config::Environment;
use music_catalog_server::media::UploadLimits;
use music_catalog_server::{
    make_app, CatalogManager, FileMediaStore, RequestsLoggingLevel, ServerConfig, UserManager,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Ids of the seeded entities
    pub seed: SeededCatalog,

    /// Root of the stored uploads, `<media>/uploads`
    pub uploads_dir: PathBuf,

    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a production server on a random port
    pub async fn spawn() -> Self {
        Self::spawn_with(Environment::Production, UploadLimits::default()).await
    }

    /// Spawns a server with the given environment and upload limits
    ///
    /// # Panics
    ///
    /// Panics if the fixtures cannot be created, the port cannot be bound or
    /// the server doesn't become ready within the timeout.
    pub async fn spawn_with(environment: Environment, upload_limits: UploadLimits) -> Self {
        let stores = create_test_stores().expect("Failed to create test stores");

        let media_store = Arc::new(
            FileMediaStore::new(stores.dir.path().join("media"), upload_limits)
                .expect("Failed to create media store"),
        );
        let uploads_dir = stores.dir.path().join("media").join("uploads");

        let user_manager = UserManager::new(
            stores.user_store.clone(),
            stores.catalog_store.clone(),
            token_issuer(),
        );
        let catalog_manager =
            CatalogManager::new(stores.catalog_store.clone(), stores.user_store.clone());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
            environment,
            upload_limits,
        };
        let app = make_app(config, catalog_manager, user_manager, media_store);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            seed: stores.seed,
            uploads_dir,
            _temp_dir: stores.dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }
            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
