//! # Config — TOML Settings for Server and Client
//!
//! One file configures both halves of lifeflow:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 7070
//! workbook = "lifeflow-workbook.json"
//! donor_sheet = "Sheet1"
//! inventory_sheet = "Inventory"
//!
//! [client]
//! endpoint = "http://127.0.0.1:7070"
//! settle_delay_ms = 1000
//! delivery = "confirmed"
//! ```
//!
//! Every field has a default, so a missing file or an empty section is valid.
//! Command-line flags and environment variables override file values.

use crate::client::DeliveryMode;
use crate::sheet::SheetLayout;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "lifeflow.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeflowConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

/// The `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub workbook: PathBuf,
    pub donor_sheet: String,
    pub inventory_sheet: String,
    pub body_limit_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let layout = SheetLayout::default();
        ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 7070,
            workbook: PathBuf::from("lifeflow-workbook.json"),
            donor_sheet: layout.donor_sheet,
            inventory_sheet: layout.inventory_sheet,
            body_limit_bytes: 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn layout(&self) -> SheetLayout {
        SheetLayout {
            donor_sheet: self.donor_sheet.clone(),
            inventory_sheet: self.inventory_sheet.clone(),
        }
    }
}

/// The `[client]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Wait before the refresh callback runs after a write.
    pub settle_delay_ms: u64,
    pub poll_interval_secs: u64,
    /// Extra attempts for requests that never reached the endpoint.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub delivery: DeliveryMode,
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: "http://127.0.0.1:7070".to_string(),
            settle_delay_ms: 1000,
            poll_interval_secs: 300,
            max_retries: 3,
            retry_base_delay_ms: 200,
            request_timeout_secs: 30,
            delivery: DeliveryMode::Confirmed,
            page_size: crate::query::DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl LifeflowConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: LifeflowConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(LifeflowConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.client.endpoint)
            .map_err(|e| anyhow::anyhow!("client.endpoint '{}' is not a URL: {}", self.client.endpoint, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("client.endpoint must be http or https, got '{}'", url.scheme());
        }
        if self.client.page_size == 0 {
            anyhow::bail!("client.page_size must be at least 1");
        }
        if self.server.donor_sheet.is_empty() || self.server.inventory_sheet.is_empty() {
            anyhow::bail!("sheet names must not be empty");
        }
        if self.server.donor_sheet == self.server.inventory_sheet {
            anyhow::bail!("donor_sheet and inventory_sheet must differ");
        }
        Ok(())
    }
}
