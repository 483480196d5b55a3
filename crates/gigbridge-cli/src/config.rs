use std::path::{Path, PathBuf};

use gigbridge_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub homeserver: HomeserverConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub gig: GigConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeserverConfig {
    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_address")]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Username template for gig-user puppets; must contain `{userid}`.
    #[serde(default = "default_username_template")]
    pub username_template: String,

    /// Database URI or path.
    #[serde(default = "default_database")]
    pub database: String,

    /// Tolerate a database newer than this binary knows about.
    #[serde(default)]
    pub allow_unsupported_db: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GigConfig {
    #[serde(default = "default_gig_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub token: String,
}

impl Default for HomeserverConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            address: default_address(),
        }
    }
}

impl Default for GigConfig {
    fn default() -> Self {
        Self {
            base_url: default_gig_base_url(),
            token: String::new(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            username_template: default_username_template(),
            database: default_database(),
            allow_unsupported_db: false,
        }
    }
}

fn default_domain() -> String {
    "example.com".to_string()
}

fn default_address() -> String {
    "http://localhost:8008".to_string()
}

fn default_username_template() -> String {
    "gig_{userid}".to_string()
}

fn default_database() -> String {
    "gigbridge.db".to_string()
}

fn default_gig_base_url() -> String {
    "https://api.gig.example/".to_string()
}

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|c| c.join("gigbridge"))
            .unwrap_or_else(|| PathBuf::from(".gigbridge"))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load(&self) -> Result<AppConfig> {
        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        if yaml_path.exists() {
            info!("loading config from {}", yaml_path.display());
            let contents = std::fs::read_to_string(&yaml_path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))
        } else if toml_path.exists() {
            info!("loading config from {}", toml_path.display());
            let contents = std::fs::read_to_string(&toml_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))
        } else {
            info!("no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigLoader;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let config = ConfigLoader::with_dir(dir.path())
            .load()
            .expect("defaults should load");

        assert_eq!(config.bridge.username_template, "gig_{userid}");
        assert_eq!(config.bridge.database, "gigbridge.db");
        assert!(!config.bridge.allow_unsupported_db);
    }

    #[test]
    fn yaml_config_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        std::fs::write(
            dir.path().join("config.yml"),
            "homeserver:\n  domain: matrix.example.org\nbridge:\n  database: sqlite:/var/lib/gigbridge/bridge.db\n  allow_unsupported_db: true\n",
        )
        .expect("config should write");

        let config = ConfigLoader::with_dir(dir.path())
            .load()
            .expect("config should load");
        assert_eq!(config.homeserver.domain, "matrix.example.org");
        assert_eq!(config.bridge.database, "sqlite:/var/lib/gigbridge/bridge.db");
        assert!(config.bridge.allow_unsupported_db);
        // Unset sections keep their defaults.
        assert_eq!(config.bridge.username_template, "gig_{userid}");
    }

    #[test]
    fn toml_config_is_accepted_too() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        std::fs::write(
            dir.path().join("config.toml"),
            "[gig]\nbase_url = \"https://api.other.example/\"\ntoken = \"secret\"\n",
        )
        .expect("config should write");

        let config = ConfigLoader::with_dir(dir.path())
            .load()
            .expect("config should load");
        assert_eq!(config.gig.base_url, "https://api.other.example/");
        assert_eq!(config.gig.token, "secret");
    }
}
