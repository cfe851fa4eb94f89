//! Configuration and file management for the flux core
//!
//! This crate provides:
//! - File path utilities for config and cache files
//! - Configuration file loading (TOML)
//! - Application configuration (FluxConfig) shared by the dispatcher and stores

pub mod config_file;
pub mod flux_config;
pub mod paths;

pub use config_file::load_config_file;
pub use flux_config::{CacheMode, FluxConfig, StatsConfig, WeekStart};
pub use paths::{cache_dir, config_dir, stats_cache_path};
