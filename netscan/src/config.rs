use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from a TOML file or defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vendor: VendorConfig,

    #[serde(default)]
    pub prober: ProberConfig,

    #[serde(default)]
    pub oui: OuiConfig,
}

/// Remote vendor lookup and durable cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorConfig {
    /// Base URL of the lookup service; the MAC is appended as a path segment.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Minimum spacing between two remote requests, shared by all callers.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Age after which a cached vendor is refreshed.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,

    /// Lookups in flight during a batch (they still share one pacing clock).
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// SQLite file holding the vendor cache.
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// Expired-entry sweep interval for long-running commands.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_api_url() -> String {
    "https://api.macvendors.com".to_string()
}

fn default_request_interval_ms() -> u64 {
    500
}

fn default_attempt_timeout_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_ttl_days() -> u64 {
    30
}

fn default_batch_concurrency() -> usize {
    4
}

fn default_cache_path() -> String {
    "vendor_cache.db".to_string()
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_interval_ms: default_request_interval_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            max_attempts: default_max_attempts(),
            ttl_days: default_ttl_days(),
            batch_concurrency: default_batch_concurrency(),
            cache_path: default_cache_path(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl VendorConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(24 * 60 * 60))
    }

    /// The cache path as an SQLite connection string.
    pub fn cache_url(&self) -> String {
        if self.cache_path.starts_with("sqlite:") || self.cache_path == ":memory:" {
            self.cache_path.clone()
        } else {
            format!("sqlite://{}", self.cache_path)
        }
    }
}

/// Live subnet probing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProberConfig {
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    #[serde(default = "default_port_timeout_ms")]
    pub port_timeout_ms: u64,

    /// Hosts probed at once.
    #[serde(default = "default_max_concurrent_hosts")]
    pub max_concurrent_hosts: usize,

    /// Port connects in flight across the whole sweep.
    #[serde(default = "default_max_concurrent_ports")]
    pub max_concurrent_ports: usize,

    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Refuse targets expanding to more candidate hosts than this.
    #[serde(default = "default_max_hosts")]
    pub max_hosts: u64,

    /// Look responding hosts up in the system ARP cache.
    #[serde(default = "default_true")]
    pub resolve_macs: bool,

    /// Reverse-resolve responding hosts.
    #[serde(default = "default_true")]
    pub resolve_hostnames: bool,
}

fn default_ping_timeout_ms() -> u64 {
    1000
}

fn default_port_timeout_ms() -> u64 {
    500
}

fn default_max_concurrent_hosts() -> usize {
    100
}

fn default_max_concurrent_ports() -> usize {
    64
}

fn default_ports() -> Vec<u16> {
    vec![22, 80, 443, 8080]
}

fn default_max_hosts() -> u64 {
    65536
}

fn default_true() -> bool {
    true
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            ping_timeout_ms: default_ping_timeout_ms(),
            port_timeout_ms: default_port_timeout_ms(),
            max_concurrent_hosts: default_max_concurrent_hosts(),
            max_concurrent_ports: default_max_concurrent_ports(),
            ports: default_ports(),
            max_hosts: default_max_hosts(),
            resolve_macs: true,
            resolve_hostnames: true,
        }
    }
}

/// Offline vendor database settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OuiConfig {
    /// IEEE `oui.txt` registry file.
    pub database_path: Option<PathBuf>,

    /// OUI prefix to vendor name; overrides every other source.
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::de::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.vendor.request_interval_ms < default_request_interval_ms() {
            anyhow::bail!(
                "vendor.request_interval_ms must be at least {} (upstream rate limit)",
                default_request_interval_ms()
            );
        }
        if self.vendor.max_attempts == 0 {
            anyhow::bail!("vendor.max_attempts must be at least 1");
        }
        if self.vendor.batch_concurrency == 0
            || self.prober.max_concurrent_hosts == 0
            || self.prober.max_concurrent_ports == 0
        {
            anyhow::bail!("concurrency limits must be at least 1");
        }
        Ok(())
    }
}
