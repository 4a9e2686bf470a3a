//! Config resolution and TOML loading tests
//!
//! Tests that manipulate SMARTSHELF_CONFIG are marked #[serial] so they do
//! not race each other.

use serde::Deserialize;
use serial_test::serial;
use smartshelf_common::config::{load_toml_or_default, resolve_config_path, CONFIG_ENV_VAR};
use std::env;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, PartialEq)]
struct Bootstrap {
    #[serde(default)]
    shelf_id: String,
    #[serde(default)]
    port: u16,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/smartshelf-env.toml");
    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/smartshelf-env.toml")));
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/smartshelf-env.toml");
    let cli = PathBuf::from("/tmp/smartshelf-cli.toml");
    let resolved = resolve_config_path(Some(&cli), CONFIG_ENV_VAR);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(cli));
}

#[test]
fn test_load_valid_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "shelf_id = \"shelf-7\"\nport = 5000").unwrap();

    let loaded: Bootstrap = load_toml_or_default(Some(file.path())).unwrap();
    assert_eq!(loaded.shelf_id, "shelf-7");
    assert_eq!(loaded.port, 5000);
}

#[test]
fn test_malformed_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number").unwrap();

    let result: smartshelf_common::Result<Bootstrap> = load_toml_or_default(Some(file.path()));
    assert!(result.is_err());
}

#[test]
fn test_no_path_uses_defaults() {
    let loaded: Bootstrap = load_toml_or_default(None).unwrap();
    assert_eq!(loaded, Bootstrap::default());
}
