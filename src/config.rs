use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::tftp::client::config::ClientConfig;
use crate::tftp::server::config::Config as ServeConfig;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".payload-tftpd.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve: Option<ServeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<ClientConfig>,
}

impl AppConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn generate_config_file(path: impl AsRef<Path>, force: bool) -> anyhow::Result<()> {
        let path = path.as_ref();

        if path.exists() && !force {
            anyhow::bail!(
                "Configuration file {} already exists. Use --force to overwrite.",
                path.display()
            );
        }

        fs::write(path, Self::generate_full_config()?)?;

        info!("Configuration file generated: {}", path.display());
        info!("Please edit this file to customize configuration");
        Ok(())
    }

    pub fn generate_full_config() -> anyhow::Result<String> {
        let config = AppConfig {
            serve: Some(ServeConfig::with_defaults()),
            fetch: Some(ClientConfig {
                server: None,
                ..ClientConfig::new(String::new(), 69)
            }),
        };
        let toml_content = toml::to_string_pretty(&config)?;
        Ok(format!(
            "# payload-tftpd configuration file\n# All fields are optional, command line arguments override config file values\n\n{}",
            toml_content
        ))
    }
}
