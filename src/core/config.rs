use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "camsync.toml";

/// Root data directory. `$CAMSYNC_DATA_DIR` wins, otherwise `~/.camsync`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CAMSYNC_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".camsync")
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub devices: DeviceConfig,

    #[serde(default)]
    pub daynight: DayNightConfig,

    #[serde(default)]
    pub images: ImageConfig,

    /// Seeds the singleton agent row at start when present.
    #[serde(default)]
    pub agent: Option<AgentSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Defaults to `<data_dir>/camsync.db`.
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub plate_images_dir: Option<PathBuf>,
    #[serde(default)]
    pub vehicle_images_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_clear_delay_secs")]
    pub clear_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayNightConfig {
    /// Six-field cron expression for the periodic reschedule sweep.
    #[serde(default = "default_resync_cron")]
    pub resync_cron: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_agent_url")]
    pub agent_url: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSeed {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub image_compression: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    18355
}
fn default_clear_delay_secs() -> u64 {
    5
}
fn default_device_timeout_secs() -> u64 {
    10
}
fn default_resync_cron() -> String {
    "0 0 3 * * *".to_string()
}
fn default_agent_url() -> String {
    "http://127.0.0.1:8355".to_string()
}
fn default_queue_capacity() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            clear_delay_secs: default_clear_delay_secs(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_device_timeout_secs(),
        }
    }
}

impl Default for DayNightConfig {
    fn default() -> Self {
        Self {
            resync_cron: default_resync_cron(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            agent_url: default_agent_url(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or `<data_dir>/camsync.toml` when `path` is `None`.
    /// A missing file yields the defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => data_dir().join(CONFIG_FILE_NAME),
        };
        if !config_path.exists() {
            info!(
                "No config at {}, using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&config_path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;

        info!(
            "Loaded config from {}: api={}:{}, clear_delay={}s, device_timeout={}s",
            config_path.display(),
            config.server.host,
            config.server.port,
            config.overlay.clear_delay_secs,
            config.devices.timeout_secs
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.overlay.clear_delay_secs == 0 {
            bail!("overlay.clear_delay_secs must be greater than zero");
        }
        if self.devices.timeout_secs == 0 {
            bail!("devices.timeout_secs must be greater than zero");
        }
        if self.images.queue_capacity == 0 {
            bail!("images.queue_capacity must be greater than zero");
        }
        if let Some(agent) = &self.agent {
            validate_coordinates(agent.latitude, agent.longitude)?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database
            .clone()
            .unwrap_or_else(|| data_dir().join("camsync.db"))
    }

    pub fn plate_images_dir(&self) -> PathBuf {
        self.storage
            .plate_images_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("images").join("plates"))
    }

    pub fn vehicle_images_dir(&self) -> PathBuf {
        self.storage
            .vehicle_images_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("images").join("vehicles"))
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_secs(self.overlay.clear_delay_secs)
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.devices.timeout_secs)
    }
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        bail!("latitude {} is outside [-90, 90]", latitude);
    }
    if !(-180.0..=180.0).contains(&longitude) {
        bail!("longitude {} is outside [-180, 180]", longitude);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 18355);
        assert_eq!(config.clear_delay(), Duration::from_secs(5));
        assert_eq!(config.device_timeout(), Duration::from_secs(10));
        assert_eq!(config.daynight.resync_cron, "0 0 3 * * *");
        assert!(config.agent.is_none());
    }

    #[tokio::test]
    async fn load_missing_file_returns_default() {
        let tmpdir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&tmpdir.path().join("absent.toml")))
            .await
            .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[tokio::test]
    async fn load_reads_sections_and_keeps_defaults_for_the_rest() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join(CONFIG_FILE_NAME);
        let content = r#"
[server]
port = 9000

[overlay]
clear_delay_secs = 8

[storage]
database = "/var/lib/camsync/camsync.db"

[agent]
latitude = 40.7128
longitude = -74.006
"#;
        std::fs::write(&path, content).unwrap();

        let config = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.clear_delay(), Duration::from_secs(8));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/camsync/camsync.db")
        );
        let agent = config.agent.unwrap();
        assert!(!agent.image_compression);
        assert!((agent.longitude + 74.006).abs() < 1e-9);
    }

    #[tokio::test]
    async fn load_rejects_out_of_range_coordinates() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[agent]\nlatitude = 95.0\nlongitude = 0.0\n").unwrap();
        assert!(AppConfig::load(Some(&path)).await.is_err());
    }

    #[test]
    fn zero_clear_delay_is_invalid() {
        let mut config = AppConfig::default();
        config.overlay.clear_delay_secs = 0;
        assert!(config.validate().is_err());
    }
}
