//! Configuration file locations
//!
//! Uses the directories crate for platform-appropriate paths:
//! - Linux: `~/.config/roku-debugger/`
//! - macOS: `~/Library/Application Support/roku-debugger/`
//! - Windows: `%APPDATA%\roku-debugger\`

use std::path::PathBuf;

const APP_NAME: &str = "roku-debugger";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
