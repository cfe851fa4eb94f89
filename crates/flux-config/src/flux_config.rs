//! Application configuration
//!
//! Configuration loaded from `.flux.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cache behavior mode for stores backed by persistence
///
/// Controls whether a fetch may be answered from the persisted table
/// (read-through) and whether fresh responses are written back
/// (write-through).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// No caching - neither read nor write
    None,

    /// Write-only - always hit the network, persist every response
    #[default]
    WriteOnly,

    /// Read-only - answer from the table when possible, never update it
    ReadOnly,

    /// Full caching - read from the table, write responses back
    ReadWrite,
}

impl CacheMode {
    /// Should we attempt to read from cache before making the transport call?
    pub fn should_read(&self) -> bool {
        matches!(self, CacheMode::ReadOnly | CacheMode::ReadWrite)
    }

    /// Should we write transport responses to cache?
    pub fn should_write(&self) -> bool {
        matches!(self, CacheMode::WriteOnly | CacheMode::ReadWrite)
    }
}

/// First day of a calendar week for week-granularity calculations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

/// Settings for the order stats store
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatsConfig {
    /// Quantity requested for a default (non-custom) days query
    #[serde(default = "default_quantity_days")]
    pub default_quantity_days: u32,

    /// Quantity requested for a default weeks query
    #[serde(default = "default_quantity_weeks")]
    pub default_quantity_weeks: u32,

    /// Quantity requested for a default months query
    #[serde(default = "default_quantity_months")]
    pub default_quantity_months: u32,

    /// Quantity requested for a default years query
    #[serde(default = "default_quantity_years")]
    pub default_quantity_years: u32,

    #[serde(default)]
    pub week_start: WeekStart,

    #[serde(default)]
    pub cache_mode: CacheMode,

    /// JSON file backing the stats table (in-memory only when absent)
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

fn default_quantity_days() -> u32 {
    30
}

fn default_quantity_weeks() -> u32 {
    17
}

fn default_quantity_months() -> u32 {
    12
}

fn default_quantity_years() -> u32 {
    1
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            default_quantity_days: default_quantity_days(),
            default_quantity_weeks: default_quantity_weeks(),
            default_quantity_months: default_quantity_months(),
            default_quantity_years: default_quantity_years(),
            week_start: WeekStart::default(),
            cache_mode: CacheMode::default(),
            cache_file: None,
        }
    }
}

/// Top-level configuration loaded from `.flux.toml`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FluxConfig {
    /// Number of worker threads serving background-mode stores
    #[serde(default = "default_background_workers")]
    pub background_workers: usize,

    #[serde(default)]
    pub stats: StatsConfig,
}

fn default_background_workers() -> usize {
    4
}

impl Default for FluxConfig {
    fn default() -> Self {
        Self {
            background_workers: default_background_workers(),
            stats: StatsConfig::default(),
        }
    }
}

impl FluxConfig {
    /// Load config from CWD first, then home directory, or use defaults
    pub fn load() -> Self {
        if let Some(content) = crate::load_config_file() {
            match Self::from_toml_str(&content) {
                Ok(config) => {
                    log::info!("Loaded flux config from file");
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to parse config file: {}", e);
                }
            }
        }

        log::debug!("Using default flux config");
        Self::default()
    }

    /// Parse a config document
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Worker count with the zero case clamped to a single worker
    pub fn worker_count(&self) -> usize {
        self.background_workers.max(1)
    }
}
