//! Persistent settings

use std::path::PathBuf;

use sa_detect::PrologixConfig;
use serde::{Deserialize, Serialize};

/// Settings stored between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// GPIB controller port and serial parameters
    #[serde(default)]
    pub prologix: PrologixConfig,
    /// Option tokens applied before the command line, e.g. `-family:tek -address:1`
    #[serde(default = "default_options")]
    pub default_options: String,
}

fn default_options() -> String {
    "-family:hp".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prologix: PrologixConfig::default(),
            default_options: default_options(),
        }
    }
}

impl Settings {
    /// Config directory for satrace
    /// Honors $XDG_CONFIG_HOME, otherwise the platform config directory
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("satrace"));
            }
        }

        dirs::config_dir().map(|p| p.join("satrace"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| Self::from_json(&s))
            .unwrap_or_default()
    }

    fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf, String> {
        let path =
            Self::settings_path().ok_or_else(|| "Could not determine settings path".to_string())?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(&path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = Settings::from_json(r#"{"prologix": {"port": "/dev/ttyUSB0"}}"#).unwrap();
        assert_eq!(settings.prologix.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(settings.prologix.baud_rate, 115_200);
        assert_eq!(settings.default_options, "-family:hp");
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = Settings::default();
        settings.prologix.port = Some("COM4".into());
        settings.default_options = "-family:scpi -address:20".into();

        let json = serde_json::to_string_pretty(&settings).unwrap();
        assert_eq!(Settings::from_json(&json), Some(settings));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(Settings::from_json("not json"), None);
    }
}
