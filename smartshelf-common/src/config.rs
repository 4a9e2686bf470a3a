//! Configuration file resolution and TOML loading
//!
//! Config file priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config file (`~/.config/smartshelf/config.toml`)
//! 4. System config file (`/etc/smartshelf/config.toml`)
//!
//! When none exists the caller runs on compiled defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SMARTSHELF_CONFIG";

/// Resolve which config file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: user then system config file
    let user_config = dirs::config_dir().map(|d| d.join("smartshelf").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/smartshelf/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load a TOML document, falling back to `T::default()` when the file is missing
///
/// A file that exists but fails to parse is an error: silently ignoring a
/// typo would run the shelf against the wrong devices.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        warn!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file {} does not exist, using built-in defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<T>(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// OS-dependent default data folder (baseline snapshot, catalog cache)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("smartshelf"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/smartshelf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/shelf.toml")), "SMARTSHELF_TEST_UNSET_VAR");
        assert_eq!(path, Some(PathBuf::from("/tmp/shelf.toml")));
    }

    #[test]
    fn test_missing_file_yields_default() {
        #[derive(Debug, Default, serde::Deserialize, PartialEq)]
        struct Sample {
            #[serde(default)]
            port: u16,
        }

        let loaded: Sample = load_toml_or_default(Some(Path::new("/nonexistent/shelf.toml"))).unwrap();
        assert_eq!(loaded, Sample::default());
    }
}
