use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub client_name: String,
    /// JACK ports the mono output is connected to.
    pub playback_ports: Vec<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            client_name: "ampstudio".to_string(),
            playback_ports: vec![
                "system:playback_1".to_string(),
                "system:playback_2".to_string(),
            ],
        }
    }
}

impl std::fmt::Display for AudioSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Client Name: {}", self.client_name)?;
        writeln!(f, "Playback Ports: {}", self.playback_ports.join(", "))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub model_dir: String,
    pub ir_dir: String,
    pub preset_dir: String,
    pub bounce_dir: String,
    pub selected_preset: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio: AudioSettings::default(),
            model_dir: "./models".to_string(),
            ir_dir: "./impulse_responses".to_string(),
            preset_dir: "./presets".to_string(),
            bounce_dir: "./bounces".to_string(),
            selected_preset: None,
        }
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "------------------------------")?;

        writeln!(f, "Audio Settings:")?;
        writeln!(f, "{}", self.audio)?;

        writeln!(f, "Settings:")?;
        writeln!(f, "Model Directory: {}", self.model_dir)?;
        writeln!(f, "Impulse Response Directory: {}", self.ir_dir)?;
        writeln!(f, "Preset Directory: {}", self.preset_dir)?;
        writeln!(f, "Bounce Directory: {}", self.bounce_dir)?;
        writeln!(
            f,
            "Selected Preset: {}",
            self.selected_preset.as_deref().unwrap_or("None")
        )?;
        Ok(())
    }
}

impl Settings {
    /// Loads from the user config directory, writing defaults if missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_settings_path())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_settings_path())
    }

    pub fn load_from(settings_path: &Path) -> Result<Self> {
        if settings_path.exists() {
            let contents =
                fs::read_to_string(settings_path).context("Failed to read settings file")?;
            let settings: Self =
                serde_json::from_str(&contents).context("Failed to parse settings")?;
            debug!("Loaded settings from {settings_path:?}");
            Ok(settings)
        } else {
            info!("No settings file found, using defaults");
            let settings = Self::default();
            // Try to save defaults, but don't fail if we can't
            let _ = settings.save_to(settings_path);
            Ok(settings)
        }
    }

    pub fn save_to(&self, settings_path: &Path) -> Result<()> {
        if let Some(parent) = settings_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(settings_path, json).context("Failed to write settings file")?;

        debug!("Saved settings to {settings_path:?}");
        Ok(())
    }

    fn get_settings_path() -> PathBuf {
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_dir)
                .join("ampstudio")
                .join(SETTINGS_FILENAME)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("ampstudio")
                .join(SETTINGS_FILENAME)
        } else {
            PathBuf::from(".").join(SETTINGS_FILENAME)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_writes_defaults() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("cfg").join(SETTINGS_FILENAME);

        let settings = Settings::load_from(&path)?;
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join(SETTINGS_FILENAME);

        let mut settings = Settings::default();
        settings.selected_preset = Some("Lead".to_string());
        settings.audio.playback_ports = vec!["system:playback_3".to_string()];
        settings.save_to(&path)?;

        assert_eq!(Settings::load_from(&path)?, settings);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join(SETTINGS_FILENAME);
        fs::write(&path, r#"{ "preset_dir": "/srv/presets" }"#)?;

        let settings = Settings::load_from(&path)?;
        assert_eq!(settings.preset_dir, "/srv/presets");
        assert_eq!(settings.audio, AudioSettings::default());
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_an_error() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join(SETTINGS_FILENAME);
        fs::write(&path, "not json")?;

        assert!(Settings::load_from(&path).is_err());
        Ok(())
    }
}
