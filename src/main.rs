use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use music_catalog_server::config::{AppConfig, CliConfig, Environment, FileConfig};
use music_catalog_server::server::metrics;
use music_catalog_server::user::TokenIssuer;
use music_catalog_server::{
    run_server, CatalogManager, FileMediaStore, RequestsLoggingLevel, ServerConfig,
    SqliteCatalogStore, SqliteUserStore, UserManager,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding catalog.db and user.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Directory for uploaded media, defaults to <db-dir>/media.
    #[clap(long, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// Optional TOML config file, its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Development exposes internal error details in responses.
    #[clap(long, default_value = "production")]
    pub environment: Environment,

    /// Secret for signing session tokens. A random one is used when missing.
    #[clap(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Lifetime of session tokens.
    #[clap(long, default_value_t = 168)]
    pub token_ttl_hours: u64,

    #[clap(long, default_value_t = 5)]
    pub max_image_upload_mb: u64,

    #[clap(long, default_value_t = 50)]
    pub max_audio_upload_mb: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            media_path: self.media_path.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            environment: self.environment,
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_hours: self.token_ttl_hours,
            max_image_upload_mb: self.max_image_upload_mb,
            max_audio_upload_mb: self.max_audio_upload_mb,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        config.catalog_db_path()
    );
    let catalog_store = Arc::new(SqliteCatalogStore::new(config.catalog_db_path())?);

    info!("Opening SQLite user database at {:?}...", config.user_db_path());
    let user_store = Arc::new(SqliteUserStore::new(config.user_db_path())?);

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Storing uploads under {:?}", config.media_path);
    let media_store = Arc::new(FileMediaStore::new(&config.media_path, config.upload_limits)?);

    let user_manager = UserManager::new(
        user_store.clone(),
        catalog_store.clone(),
        TokenIssuer::new(&config.jwt_secret, config.token_ttl),
    );
    let catalog_manager = CatalogManager::new(catalog_store, user_store);

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level,
        port: config.port,
        metrics_port: config.metrics_port,
        environment: config.environment,
        upload_limits: config.upload_limits,
    };
    info!("Running in {:?} mode", server_config.environment);
    run_server(server_config, catalog_manager, user_manager, media_store).await
}
