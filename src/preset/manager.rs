use super::Preset;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub struct Manager {
    presets_dir: PathBuf,
    presets: Vec<Preset>,
}

impl Manager {
    pub fn new(preset_dir: impl AsRef<Path>) -> Result<Self> {
        let presets_dir = preset_dir.as_ref().to_path_buf();
        fs::create_dir_all(&presets_dir).context("Failed to create presets directory")?;

        let mut manager = Self {
            presets_dir,
            presets: Vec::new(),
        };

        manager.load_presets()?;

        Ok(manager)
    }

    pub fn load_presets(&mut self) -> Result<()> {
        self.presets.clear();

        if !self.presets_dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&self.presets_dir)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_preset_file(&path) {
                    Ok(preset) => self.presets.push(preset),
                    Err(e) => {
                        warn!("Failed to load preset {}: {e}", path.display());
                    }
                }
            }
        }

        self.presets.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            "Loaded {} presets from {}",
            self.presets.len(),
            self.presets_dir.display()
        );

        Ok(())
    }

    pub fn save_preset(&mut self, preset: &Preset) -> Result<()> {
        if preset.name.trim().is_empty() {
            bail!("Preset name must not be empty");
        }

        let path = self.preset_path(&preset.name);
        let json = serde_json::to_string_pretty(preset).context("Failed to serialize preset")?;

        fs::write(&path, json).context("Failed to write preset file")?;

        self.load_presets()
    }

    pub fn delete_preset(&mut self, preset_name: &str) -> Result<()> {
        let path = self.preset_path(preset_name);

        if path.exists() {
            fs::remove_file(&path).context("Failed to delete preset file")?;
            self.load_presets()
        } else {
            bail!("Preset file not found: {preset_name}")
        }
    }

    /// Saves the preset under `new_name` and removes the old file.
    pub fn rename_preset(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let mut preset = self
            .get_preset_by_name(old_name)
            .cloned()
            .with_context(|| format!("Preset not found: {old_name}"))?;

        let old_path = self.preset_path(old_name);
        preset.name = new_name.to_string();
        self.save_preset(&preset)?;

        if old_path != self.preset_path(new_name) && old_path.exists() {
            fs::remove_file(&old_path).context("Failed to remove renamed preset file")?;
            self.load_presets()?;
        }

        Ok(())
    }

    pub fn preset_exists(&self, name: &str) -> bool {
        self.presets.iter().any(|p| p.name == name)
    }

    pub fn get_presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get_preset_by_name(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    fn preset_path(&self, name: &str) -> PathBuf {
        self.presets_dir
            .join(format!("{}.json", sanitize_filename(name)))
    }
}

fn load_preset_file(path: &Path) -> Result<Preset> {
    let content = fs::read_to_string(path).context("Failed to read preset file")?;

    serde_json::from_str(&content).context("Failed to parse preset JSON")
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
