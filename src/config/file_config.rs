use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// TOML configuration. Every key mirrors a CLI argument and overrides it.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub media_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub environment: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: Option<u64>,
    pub max_image_upload_mb: Option<u64>,
    pub max_audio_upload_mb: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 4000\nenvironment = \"development\"\nmax_audio_upload_mb = 10"
        )
        .unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.port, Some(4000));
        assert_eq!(config.environment.as_deref(), Some("development"));
        assert_eq!(config.max_audio_upload_mb, Some(10));
        assert!(config.db_dir.is_none());
    }

    #[test]
    fn rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
