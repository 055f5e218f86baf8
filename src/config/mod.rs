mod file_config;

pub use file_config::FileConfig;

use crate::media::UploadLimits;
use crate::server::RequestsLoggingLevel;
use crate::user::auth::generate_secret;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Deployment environment. Development responses carry error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

/// CLI arguments that can be used for config resolution.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub environment: Environment,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: u64,
    pub max_image_upload_mb: u64,
    pub max_audio_upload_mb: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            db_dir: None,
            media_path: None,
            port: 3001,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::default(),
            environment: Environment::default(),
            jwt_secret: None,
            token_ttl_hours: 168,
            max_image_upload_mb: 5,
            max_audio_upload_mb: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub environment: Environment,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub upload_limits: UploadLimits,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.join("media"));

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let environment = match file.environment {
            Some(raw) => match parse_environment(&raw) {
                Some(environment) => environment,
                None => bail!("Unknown environment in config file: {}", raw),
            },
            None => cli.environment,
        };

        let jwt_secret = match file.jwt_secret.or_else(|| cli.jwt_secret.clone()) {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("No JWT secret configured, using a random one. Tokens will not survive a restart.");
                generate_secret()
            }
        };

        let token_ttl_hours = file.token_ttl_hours.unwrap_or(cli.token_ttl_hours);
        if token_ttl_hours == 0 {
            bail!("token_ttl_hours must be greater than zero");
        }

        let upload_limits = UploadLimits {
            max_image_bytes: file
                .max_image_upload_mb
                .unwrap_or(cli.max_image_upload_mb)
                .saturating_mul(BYTES_PER_MB),
            max_audio_bytes: file
                .max_audio_upload_mb
                .unwrap_or(cli.max_audio_upload_mb)
                .saturating_mul(BYTES_PER_MB),
        };

        Ok(Self {
            db_dir,
            media_path,
            port,
            metrics_port,
            logging_level,
            environment,
            jwt_secret,
            token_ttl: Duration::from_secs(token_ttl_hours * 3600),
            upload_limits,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

fn parse_environment(s: &str) -> Option<Environment> {
    Environment::from_str(s, true).ok()
}
