use serde::{Deserialize, Serialize};

/// Complete set of engine parameters, swapped as one value.
///
/// dB fields accept any finite value. `tone`, `drive`, `presence` and
/// `master_volume` are on a nominal 0-10 scale that the engine does not
/// enforce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfiguration {
    pub input_gain_db: f64,
    pub output_gain_db: f64,
    /// 0.0 is fully dry, 1.0 fully wet.
    pub wet_dry_mix: f64,
    pub noise_gate_enabled: bool,
    pub noise_gate_threshold_db: f64,
    pub limiter_enabled: bool,
    pub tone: f64,
    pub drive: f64,
    pub presence: f64,
    pub master_volume: f64,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            input_gain_db: 0.0,
            output_gain_db: 0.0,
            wet_dry_mix: 1.0,
            noise_gate_enabled: false,
            noise_gate_threshold_db: -60.0,
            limiter_enabled: true,
            tone: 5.0,
            drive: 5.0,
            presence: 5.0,
            master_volume: 5.0,
        }
    }
}

impl EngineConfiguration {
    /// Returns the configuration with `wet_dry_mix` clamped to [0, 1].
    ///
    /// NaN is left as is and propagates through the mix.
    pub fn normalized(mut self) -> Self {
        self.wet_dry_mix = self.wet_dry_mix.clamp(0.0, 1.0);
        self
    }

    pub fn with_wet_dry_mix(mut self, mix: f64) -> Self {
        self.wet_dry_mix = mix.clamp(0.0, 1.0);
        self
    }
}

impl std::fmt::Display for EngineConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Input Gain: {:.1} dB", self.input_gain_db)?;
        writeln!(f, "Output Gain: {:.1} dB", self.output_gain_db)?;
        writeln!(f, "Wet/Dry Mix: {:.2}", self.wet_dry_mix)?;
        writeln!(
            f,
            "Noise Gate: {} ({:.1} dB)",
            if self.noise_gate_enabled { "on" } else { "off" },
            self.noise_gate_threshold_db
        )?;
        writeln!(
            f,
            "Limiter: {}",
            if self.limiter_enabled { "on" } else { "off" }
        )?;
        writeln!(
            f,
            "Tone/Drive/Presence/Master: {:.1}/{:.1}/{:.1}/{:.1}",
            self.tone, self.drive, self.presence, self.master_volume
        )
    }
}
