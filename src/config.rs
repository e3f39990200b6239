use crate::extension::Preferences;
use anyhow::Context;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub preferences: Preferences,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                listen: "127.0.0.1:3000".to_string(),
            },
            preferences: Preferences::default(),
            logging: Some(LoggingConfig {
                level: "info".to_string(),
            }),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.socket_addr(None)?;
        if let Some(logging) = &self.logging {
            LevelFilter::from_str(&logging.level)
                .map_err(|_| anyhow::anyhow!("Invalid logging level: {}", logging.level))?;
        }
        Ok(())
    }

    /// Level from the `logging` section, Info when absent or unparseable.
    pub fn log_level(&self) -> LevelFilter {
        self.logging
            .as_ref()
            .and_then(|logging| LevelFilter::from_str(&logging.level).ok())
            .unwrap_or(LevelFilter::Info)
    }
}

impl ServerConfig {
    /// Listen address, with the port replaced by `port_override` when given
    /// (the binary passes the `PORT` environment variable here).
    pub fn socket_addr(&self, port_override: Option<&str>) -> anyhow::Result<SocketAddr> {
        let mut addr: SocketAddr = self
            .listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen))?;

        if let Some(port) = port_override {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid port: {}", port))?;
            addr.set_port(port);
        }

        Ok(addr)
    }
}
