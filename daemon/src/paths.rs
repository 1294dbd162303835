/// Canonical file paths for KeyHud data files on Windows.
///
/// The config file lives under %APPDATA%\KeyHud\config.toml and is read once at
/// startup.
use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR_NAME: &str = "KeyHud";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Returns the KeyHud application data directory: %APPDATA%\KeyHud\
pub fn app_data_dir() -> Result<PathBuf> {
    let appdata = std::env::var_os("APPDATA").context("APPDATA environment variable not set")?;
    Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
}

/// Returns the full path to the config file: %APPDATA%\KeyHud\config.toml
pub fn config_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(CONFIG_FILE_NAME))
}
