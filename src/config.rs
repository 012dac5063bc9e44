//! Configuration management for the led_dimmerd daemon.
//!
//! Handles loading, parsing, validation and change analysis of the YAML
//! configuration that supplies the light threshold, the dim scaling and the
//! LED channel layout.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;

use crate::{
    channel::Channel,
    drivers::sysfs_led::DEFAULT_BASE_PATH,
    event::ConfigChangeType,
    scaling::{ScalingPercent, Threshold},
};

/// Environment variable overriding the configuration location.
pub const CONFIG_ENV: &str = "LED_DIMMERD_CONFIG";

/// Main configuration structure for the led_dimmerd daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// threshold: 10
/// dim_scaling: 40
/// write_timeout_ms: 500
/// leds:
///   base_path: /sys/class/leds
///   colors: [red, green, blue]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Light level below which the LEDs are dimmed.
    #[serde(default = "defaults::threshold")]
    pub threshold: Threshold,

    /// Dim scaling percentage. Values outside 3..=100 are ignored.
    #[serde(default = "defaults::dim_scaling")]
    pub dim_scaling: i32,

    /// Upper bound for one channel write in milliseconds.
    #[serde(default = "defaults::write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// LED channel layout.
    #[serde(default)]
    pub leds: LedCfg,
}

/// Location and channels of the LED to dim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedCfg {
    /// LED class directory holding the `led:rgb_<color>` entries.
    #[serde(default = "defaults::base_path")]
    pub base_path: PathBuf,

    /// Channels in write order.
    #[serde(default = "Channel::rgb")]
    pub colors: Vec<Channel>,
}

impl Default for LedCfg {
    fn default() -> Self {
        Self {
            base_path: defaults::base_path(),
            colors: Channel::rgb(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            threshold: defaults::threshold(),
            dim_scaling: defaults::dim_scaling(),
            write_timeout_ms: defaults::write_timeout_ms(),
            leds: LedCfg::default(),
        }
    }
}

impl Config {
    /// Validates the configuration for consistency.
    ///
    /// An out-of-range `dim_scaling` is not an error; it only produces a
    /// warning because the controller ignores it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use led_dimmerd::config::Config;
    ///
    /// let config = Config::default();
    /// config.validate()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            anyhow::bail!("Unsupported config version {}", self.version);
        }

        if self.leds.colors.is_empty() {
            anyhow::bail!("At least one LED color must be configured");
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self.leds.colors.iter().find(|c| !seen.insert(*c)) {
            anyhow::bail!("LED color '{}' is configured more than once", duplicate);
        }

        if self.write_timeout_ms == 0 {
            anyhow::bail!("write_timeout_ms must be greater than zero");
        }

        if ScalingPercent::dim(self.dim_scaling).is_err() {
            warn!(
                "dim_scaling {} is outside 3..=100 and will be ignored",
                self.dim_scaling
            );
        }

        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Classifies the difference between `self` and `new`.
    ///
    /// Tunables are compared on their own, so a pending layout change does
    /// not hide a later threshold edit. Returns `None` when nothing relevant
    /// changed.
    pub fn diff(&self, new: &Config) -> Option<ConfigChangeType> {
        let tunables_changed =
            self.threshold != new.threshold || self.dim_scaling != new.dim_scaling;

        let mut changed_sections = Vec::new();
        if self.leds != new.leds {
            changed_sections.push("leds".to_string());
        }
        if self.write_timeout_ms != new.write_timeout_ms {
            changed_sections.push("write_timeout_ms".to_string());
        }
        if !changed_sections.is_empty() {
            return Some(ConfigChangeType::ColdRestart {
                changed_sections,
                tunables_changed,
            });
        }

        tunables_changed.then_some(ConfigChangeType::HotReload)
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::scaling::{DEFAULT_THRESHOLD, ScalingPercent, Threshold};

    pub fn threshold() -> Threshold {
        DEFAULT_THRESHOLD
    }

    pub fn dim_scaling() -> i32 {
        i32::from(ScalingPercent::DEFAULT_DIM.get())
    }

    pub fn write_timeout_ms() -> u64 {
        500
    }

    pub fn base_path() -> PathBuf {
        PathBuf::from(super::DEFAULT_BASE_PATH)
    }
}

fn locate_config() -> Result<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(env_path));
    }

    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("led_dimmerd/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir);
        }
    }

    let etc = Path::new("/etc/led_dimmerd/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

/// Holds the active configuration and the file it came from.
///
/// # Example
///
/// ```no_run
/// use led_dimmerd::config::ConfigManager;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = ConfigManager::load(None).await?;
/// let threshold = config_manager.get().await.threshold;
/// config_manager.reload().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches in order:
    /// 1. Provided path parameter
    /// 2. `LED_DIMMERD_CONFIG` environment variable
    /// 3. `$XDG_CONFIG_HOME/led_dimmerd/config.yml` or `~/.config/led_dimmerd/config.yml`
    /// 4. `/etc/led_dimmerd/config.yml`
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path)?;

        Ok(Self::new(config, config_path))
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn get(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config.read().await
    }

    /// Returns the path to the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clones the current configuration.
    pub async fn clone_config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Reloads configuration from the same file.
    pub async fn reload(&self) -> Result<()> {
        info!("Reloading config from: {}", self.path.display());
        let new_config = Self::load_config_from_path(&self.path)?;

        *self.config.write().await = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Takes threshold and dim scaling from the file and keeps everything else.
    ///
    /// Used while a layout change waits for a restart: the in-memory layout
    /// stays the one the running controller was built with.
    pub async fn reload_tunables(&self) -> Result<()> {
        info!("Reloading tunables from: {}", self.path.display());
        let on_disk = Self::load_config_from_path(&self.path)?;

        let mut config = self.config.write().await;
        config.threshold = on_disk.threshold;
        config.dim_scaling = on_disk.dim_scaling;
        Ok(())
    }

    /// Compares the file on disk with the active configuration.
    ///
    /// The active configuration is left untouched.
    pub async fn analyze_config_changes(&self) -> Result<Option<ConfigChangeType>> {
        let on_disk = Self::load_config_from_path(&self.path)?;
        Ok(self.config.read().await.diff(&on_disk))
    }

    fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}
