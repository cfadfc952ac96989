//! Server settings
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `PETLENS__`-prefixed environment variables, then command-line overrides.

use anyhow::Context;
use petlens_classifier::{ModelConfig, ModelSource};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `PETLENS__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "PETLENS";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Classification model
    #[serde(default)]
    pub model: ModelConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

/// Command-line overrides applied on top of file and environment values
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Local weights file; replaces the configured model source
    pub model_path: Option<PathBuf>,
    /// Standalone model YAML; replaces the whole `model` section
    pub model_config: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file, environment and CLI overrides
    pub fn load(config_path: &Path, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration {}", config_path.display()))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        config.apply_overrides(overrides)?;
        config.model.validate()?;

        Ok(config)
    }

    /// Apply CLI overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> anyhow::Result<()> {
        if let Some(path) = &overrides.model_config {
            self.model = ModelConfig::from_file(path)?;
        }

        if let Some(path) = &overrides.model_path {
            self.model.source = ModelSource::Local { path: path.clone() };
        }

        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }

        if let Some(port) = overrides.port {
            self.server.port = port;
        }

        Ok(())
    }

    /// Render the effective configuration as YAML
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Failed to render configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Serializes tests that read the process environment through `load`
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_defaults_without_file() {
        let _guard = env_lock();
        let config = AppConfig::load(
            Path::new("/nonexistent/petlens.yaml"),
            &ConfigOverrides::default(),
        )
        .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.model.source,
            ModelSource::Local {
                path: PathBuf::from("best_model.safetensors")
            }
        );
    }

    #[test]
    fn test_file_values_and_overrides() {
        let _guard = env_lock();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 8081
  max_upload_bytes: 1024
model:
  architecture:
    type: resnet
    depth: 34
  output:
    threshold: 0.7
"#
        )
        .unwrap();

        let overrides = ConfigOverrides {
            port: Some(9090),
            model_path: Some(PathBuf::from("/models/pets.safetensors")),
            ..Default::default()
        };
        let config = AppConfig::load(file.path(), &overrides).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.max_upload_bytes, 1024);
        assert_eq!(config.model.architecture.describe(), "resnet34");
        assert_eq!(config.model.output.threshold, 0.7);
        assert_eq!(
            config.model.source,
            ModelSource::Local {
                path: PathBuf::from("/models/pets.safetensors")
            }
        );
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let _guard = env_lock();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "model:\n  output:\n    threshold: 3.0\n").unwrap();

        assert!(AppConfig::load(file.path(), &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let _guard = env_lock();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "server:\n  port: 8081\nmodel:\n  output:\n    threshold: 0.7\n").unwrap();

        std::env::set_var("PETLENS__SERVER__PORT", "6006");
        std::env::set_var("PETLENS__MODEL__OUTPUT__THRESHOLD", "0.25");
        let loaded = AppConfig::load(file.path(), &ConfigOverrides::default());
        std::env::remove_var("PETLENS__SERVER__PORT");
        std::env::remove_var("PETLENS__MODEL__OUTPUT__THRESHOLD");

        let config = loaded.unwrap();
        assert_eq!(config.server.port, 6006);
        assert_eq!(config.model.output.threshold, 0.25);
    }

    #[test]
    fn test_cli_port_beats_environment() {
        let _guard = env_lock();
        std::env::set_var("PETLENS__SERVER__PORT", "6006");
        let overrides = ConfigOverrides {
            port: Some(7007),
            ..Default::default()
        };
        let loaded = AppConfig::load(Path::new("/nonexistent/petlens.yaml"), &overrides);
        std::env::remove_var("PETLENS__SERVER__PORT");

        assert_eq!(loaded.unwrap().server.port, 7007);
    }

    #[test]
    fn test_model_config_file_replaces_model_section() {
        let _guard = env_lock();
        let mut server_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            server_file,
            "model:\n  name: \"from-server-file\"\n  output:\n    threshold: 0.9\n"
        )
        .unwrap();

        let mut model_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            model_file,
            r#"
name: "standalone"
architecture:
  type: resnet
  depth: 101
output:
  positive_label: "dog"
  negative_label: "cat"
"#
        )
        .unwrap();

        let overrides = ConfigOverrides {
            model_config: Some(model_file.path().to_path_buf()),
            model_path: Some(PathBuf::from("weights/pets.safetensors")),
            ..Default::default()
        };
        let config = AppConfig::load(server_file.path(), &overrides).unwrap();

        assert_eq!(config.model.name, "standalone");
        assert_eq!(config.model.architecture.describe(), "resnet101");
        assert_eq!(config.model.output.threshold, 0.5);
        assert_eq!(config.model.output.positive_label, "dog");
        assert_eq!(
            config.model.source,
            ModelSource::Local {
                path: PathBuf::from("weights/pets.safetensors")
            }
        );
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            ..Default::default()
        };
        assert_eq!(server.socket_addr().unwrap().port(), 5000);
    }
}
