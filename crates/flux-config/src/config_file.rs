//! Config file discovery
//!
//! The first readable candidate wins:
//! `./.flux.toml`, `~/.flux.toml`, `<platform config dir>/flux.toml`.

use std::env;
use std::fs;
use std::path::PathBuf;

const DOTFILE: &str = ".flux.toml";
const PLATFORM_FILE: &str = "flux.toml";

/// Content of the first config file found, if any
pub fn load_config_file() -> Option<String> {
    read_first(candidates())
}

fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DOTFILE)];
    if let Some(home) = env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(DOTFILE));
    }
    match crate::paths::config_dir() {
        Ok(dir) => paths.push(dir.join(PLATFORM_FILE)),
        Err(e) => log::trace!("No platform config dir: {:#}", e),
    }
    paths
}

fn read_first(paths: impl IntoIterator<Item = PathBuf>) -> Option<String> {
    paths.into_iter().find_map(|path| {
        let content = fs::read_to_string(&path).ok()?;
        log::debug!("Loaded config from {}", path.display());
        Some(content)
    })
}
