//! Configuration and data directory paths
//!
//! Uses XDG directories via `dirs` crate.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/flux/`, `~/.cache/flux/`
//! - macOS: `~/Library/Application Support/flux/`, `~/Library/Caches/flux/`
//! - Windows: `%APPDATA%\flux\`, `%LOCALAPPDATA%\flux\`

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_NAME: &str = "flux";

/// Get the application config directory, creating it if needed
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    Ok(dir)
}

/// Get the application cache directory, creating it if needed
pub fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("Could not determine cache directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
    Ok(dir)
}

/// Default location of the persisted order stats table
pub fn stats_cache_path() -> Result<PathBuf> {
    Ok(cache_dir()?.join("order-stats.json"))
}
