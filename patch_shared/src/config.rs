//! Configuration system.
//!
//! The boot configuration is persisted as JSON and loaded once per process.
//! Required fields mirror what a shipped client carries (module lists, remote
//! base URL, platform suffix, cache root); tunables fall back to defaults.

use std::{fmt, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::module::{ModuleDescriptor, ModuleKind};

/// How a resource package sources its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayStrategy {
    /// Manifest synthesized from a local directory; never touches the network.
    Simulated,
    /// Only content already shipped in local built-in storage.
    OfflineOnly,
    /// Local cache kept in sync with a remote content host.
    HostSynced,
}

impl PlayStrategy {
    /// The strategy to fall back to after a recoverable network failure.
    ///
    /// Only `HostSynced` has a degraded form.
    pub fn downgrade(self) -> Option<PlayStrategy> {
        match self {
            PlayStrategy::HostSynced => Some(PlayStrategy::OfflineOnly),
            PlayStrategy::OfflineOnly | PlayStrategy::Simulated => None,
        }
    }
}

impl fmt::Display for PlayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayStrategy::Simulated => write!(f, "simulated"),
            PlayStrategy::OfflineOnly => write!(f, "offline"),
            PlayStrategy::HostSynced => write!(f, "host"),
        }
    }
}

impl FromStr for PlayStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "simulate" => Ok(PlayStrategy::Simulated),
            "offline" | "offline_only" => Ok(PlayStrategy::OfflineOnly),
            "host" | "host_synced" => Ok(PlayStrategy::HostSynced),
            other => anyhow::bail!("unknown play strategy `{other}`"),
        }
    }
}

/// Root boot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootConfig {
    /// Strategy chosen at startup.
    #[serde(default = "default_strategy")]
    pub strategy: PlayStrategy,
    /// Resource package name.
    #[serde(default = "default_package_name")]
    pub package_name: String,
    /// Ahead-of-time module images to patch, in order.
    #[serde(default)]
    pub aot_modules: Vec<String>,
    /// The single dynamically updatable module.
    pub dynamic_module: String,
    /// Remote base URL, e.g. `tcp://127.0.0.1:9000/Test`.
    pub base_url: String,
    /// Per-platform path suffix appended to `base_url`, e.g. `PC` or `Android`.
    pub platform_suffix: String,
    /// Root of the local storage layout.
    pub local_cache_root: String,
    /// Optional separate fallback base URL; defaults to `base_url`.
    #[serde(default)]
    pub fallback_url: Option<String>,
    /// Maximum concurrent file downloads.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,
    /// Retries per file before it is marked failed.
    #[serde(default = "default_max_retries")]
    pub max_retries_per_file: u32,
    /// Linear backoff step between download retries.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Timeout applied to every suspension point.
    #[serde(default = "default_phase_timeout_ms")]
    pub phase_timeout_ms: u64,
    /// Ceiling on package initializations per boot.
    #[serde(default = "default_max_boot_attempts")]
    pub max_boot_attempts: u32,
    /// Scene handed to the scene loader at the end of the boot.
    #[serde(default = "default_main_scene")]
    pub main_scene: String,
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_strategy() -> PlayStrategy {
    PlayStrategy::HostSynced
}

fn default_package_name() -> String {
    "DefaultPackage".to_string()
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_phase_timeout_ms() -> u64 {
    30_000
}

fn default_max_boot_attempts() -> u32 {
    2
}

fn default_main_scene() -> String {
    "Main".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BootConfig {
    /// Builds a config with the required fields and default tunables.
    pub fn new(
        dynamic_module: impl Into<String>,
        base_url: impl Into<String>,
        platform_suffix: impl Into<String>,
        local_cache_root: impl Into<String>,
    ) -> Self {
        Self {
            strategy: default_strategy(),
            package_name: default_package_name(),
            aot_modules: Vec::new(),
            dynamic_module: dynamic_module.into(),
            base_url: base_url.into(),
            platform_suffix: platform_suffix.into(),
            local_cache_root: local_cache_root.into(),
            fallback_url: None,
            max_concurrent_downloads: default_max_concurrent(),
            max_retries_per_file: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            phase_timeout_ms: default_phase_timeout_ms(),
            max_boot_attempts: default_max_boot_attempts(),
            main_scene: default_main_scene(),
            log_level: default_log_level(),
        }
    }

    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// Primary host URL: base URL joined with the platform suffix.
    pub fn host_server_url(&self) -> String {
        join_url(&self.base_url, &self.platform_suffix)
    }

    /// Fallback host URL; the primary host when no fallback is configured.
    pub fn fallback_server_url(&self) -> String {
        match &self.fallback_url {
            Some(url) => join_url(url, &self.platform_suffix),
            None => self.host_server_url(),
        }
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_millis(self.phase_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Declared AOT modules, in config order.
    pub fn aot_descriptors(&self) -> Vec<ModuleDescriptor> {
        self.aot_modules
            .iter()
            .map(|name| ModuleDescriptor::new(name.clone(), ModuleKind::AheadOfTime))
            .collect()
    }

    pub fn dynamic_descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new(self.dynamic_module.clone(), ModuleKind::Dynamic)
    }

    /// Every asset key that must be staged before module loading.
    ///
    /// The dynamic module comes first, then AOT images, without duplicates.
    pub fn required_assets(&self) -> Vec<String> {
        let mut keys = vec![self.dynamic_module.clone()];
        for name in &self.aot_modules {
            if !keys.contains(name) {
                keys.push(name.clone());
            }
        }
        keys
    }
}

fn join_url(base: &str, suffix: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = suffix.trim_matches('/');
    if suffix.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{suffix}")
    }
}
