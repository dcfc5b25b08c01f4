//! Platform-specific settings locations.
//!
//! - Linux: `~/.config/polyvox/`
//! - macOS: `~/Library/Application Support/polyvox/`
//! - Windows: `%APPDATA%\polyvox\`

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "polyvox";

/// Settings file name inside [`user_config_dir`].
const SETTINGS_FILE: &str = "settings.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the default settings file path.
pub fn default_settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_path_under_config_dir() {
        let path = default_settings_path();
        assert!(path.starts_with(user_config_dir()));
        assert!(path.ends_with("polyvox/settings.toml"));
    }
}
