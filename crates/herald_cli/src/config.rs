//! herald.toml file handling

use anyhow::{Context, Result};
use herald_core::{DispatcherConfig, HeraldConfig};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "herald.toml";

/// Resolve `path` to a config file (a directory means `<dir>/herald.toml`)
pub fn config_path(path: &Path) -> PathBuf {
    if path.is_file() {
        path.to_path_buf()
    } else {
        path.join(CONFIG_FILE)
    }
}

/// Load configuration from a directory or file
pub fn load(path: &Path) -> Result<HeraldConfig> {
    let config_path = config_path(path);

    if !config_path.exists() {
        anyhow::bail!(
            "No {} found in {}. Run `herald init` to create one.",
            CONFIG_FILE,
            path.display()
        );
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    HeraldConfig::from_toml(&content)
        .with_context(|| format!("Failed to parse {}", config_path.display()))
}

/// Load configuration, falling back to defaults when no file exists
pub fn load_or_default(path: &Path) -> Result<HeraldConfig> {
    if config_path(path).exists() {
        load(path)
    } else {
        tracing::info!("No {} in {}, using defaults", CONFIG_FILE, path.display());
        Ok(HeraldConfig::default())
    }
}

/// Starter configuration written by `herald init`
pub fn starter() -> HeraldConfig {
    HeraldConfig {
        error_message: None,
        events: vec![
            DispatcherConfig::new("Engine", "FrameTick"),
            DispatcherConfig::new("World", "RegionChange"),
        ],
    }
}

/// Serialize to TOML string
pub fn to_toml(config: &HeraldConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}

/// Write the starter config into `dir`, refusing to overwrite
pub fn init(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    fs::write(&path, to_toml(&starter())?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("herald-cli-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_init_then_load() {
        let dir = scratch_dir("init");
        let path = init(&dir).unwrap();
        assert_eq!(path, dir.join(CONFIG_FILE));

        let config = load(&dir).unwrap();
        assert_eq!(config, starter());

        assert!(init(&dir).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_config() {
        let dir = scratch_dir("missing");
        assert!(load(&dir).is_err());
        assert_eq!(load_or_default(&dir).unwrap(), HeraldConfig::default());
    }
}
