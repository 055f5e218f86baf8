use super::RequestsLoggingLevel;
use crate::config::Environment;
use crate::media::UploadLimits;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub environment: Environment,
    pub upload_limits: UploadLimits,
}

impl ServerConfig {
    pub fn exposes_error_details(&self) -> bool {
        self.environment == Environment::Development
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            environment: Environment::Production,
            upload_limits: UploadLimits::default(),
        }
    }
}
