use serde::{Deserialize, Serialize};

use crate::audio::EngineConfiguration;

pub mod manager;

pub use manager::Manager;

/// Saved engine settings plus the model and impulse response they were
/// dialled in with. Empty paths mean "none".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub name: String,
    pub model_path: String,
    pub ir_path: String,
    pub input_gain: f64,
    pub output_gain: f64,
    pub wet_dry_mix: f64,
    pub tone: f64,
    pub drive: f64,
    pub presence: f64,
    pub master_volume: f64,
    pub noise_gate_threshold: f64,
    pub noise_gate_enabled: bool,
    pub limiter_enabled: bool,
}

impl Default for Preset {
    fn default() -> Self {
        Self::from_configuration("Untitled", &EngineConfiguration::default(), "", "")
    }
}

impl Preset {
    pub fn from_configuration(
        name: impl Into<String>,
        config: &EngineConfiguration,
        model_path: impl Into<String>,
        ir_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model_path: model_path.into(),
            ir_path: ir_path.into(),
            input_gain: config.input_gain_db,
            output_gain: config.output_gain_db,
            wet_dry_mix: config.wet_dry_mix,
            tone: config.tone,
            drive: config.drive,
            presence: config.presence,
            master_volume: config.master_volume,
            noise_gate_threshold: config.noise_gate_threshold_db,
            noise_gate_enabled: config.noise_gate_enabled,
            limiter_enabled: config.limiter_enabled,
        }
    }

    pub fn configuration(&self) -> EngineConfiguration {
        EngineConfiguration {
            input_gain_db: self.input_gain,
            output_gain_db: self.output_gain,
            wet_dry_mix: self.wet_dry_mix,
            noise_gate_enabled: self.noise_gate_enabled,
            noise_gate_threshold_db: self.noise_gate_threshold,
            limiter_enabled: self.limiter_enabled,
            tone: self.tone,
            drive: self.drive,
            presence: self.presence,
            master_volume: self.master_volume,
        }
        .normalized()
    }

    pub fn model_path(&self) -> Option<&str> {
        Some(self.model_path.as_str()).filter(|p| !p.trim().is_empty())
    }

    pub fn ir_path(&self) -> Option<&str> {
        Some(self.ir_path.as_str()).filter(|p| !p.trim().is_empty())
    }
}
