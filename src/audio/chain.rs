use crate::audio::config::EngineConfiguration;
use crate::audio::level_meter::{LevelMeter, db_to_linear};
use crate::ir::ImpulseResponse;
use crate::model::AmplifierModel;

/// Input and output meters updated by [`SignalChain::process`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainMeters {
    pub input: LevelMeter,
    pub output: LevelMeter,
}

/// Knob-driven soft clipper that follows the amplifier model.
#[derive(Debug, Clone, Copy)]
struct AmpVoicing {
    gain: f32,
    presence: f32,
    tone: f32,
    master: f32,
}

impl AmpVoicing {
    fn new(config: &EngineConfiguration) -> Self {
        Self {
            gain: 1.0 + (config.drive / 10.0 * 4.0) as f32,
            presence: 1.0 + (config.presence / 20.0) as f32,
            tone: (config.tone / 10.0).clamp(0.2, 1.0) as f32,
            master: (config.master_volume / 10.0) as f32,
        }
    }

    #[inline]
    fn apply(&self, sample: f32) -> f32 {
        (sample * self.gain * self.presence).tanh() * self.tone * self.master
    }
}

/// One pass of the processing pipeline, resolved against a configuration
/// snapshot and the capabilities active when it was built.
///
/// Stage order: input meter, noise gate, input gain, amp model and voicing,
/// cabinet, wet/dry mix, output gain, limiter, output meter. Bypass skips
/// the model, voicing, cabinet and mix stages.
pub struct SignalChain<'a> {
    model: Option<&'a dyn AmplifierModel>,
    impulse_response: Option<&'a ImpulseResponse>,
    bypassed: bool,
    gate_threshold: Option<f64>,
    input_gain: f32,
    voicing: AmpVoicing,
    wet_dry_mix: f64,
    output_gain: f32,
    limiter_enabled: bool,
}

impl<'a> SignalChain<'a> {
    pub fn new(
        config: &EngineConfiguration,
        model: Option<&'a dyn AmplifierModel>,
        impulse_response: Option<&'a ImpulseResponse>,
        bypassed: bool,
    ) -> Self {
        Self {
            model,
            impulse_response,
            bypassed,
            gate_threshold: config
                .noise_gate_enabled
                .then(|| db_to_linear(config.noise_gate_threshold_db)),
            input_gain: db_to_linear(config.input_gain_db) as f32,
            voicing: AmpVoicing::new(config),
            wet_dry_mix: config.wet_dry_mix,
            output_gain: db_to_linear(config.output_gain_db) as f32,
            limiter_enabled: config.limiter_enabled,
        }
    }

    #[inline]
    pub fn process(&self, input: f32, meters: &mut ChainMeters) -> f32 {
        let dry = input;
        meters.input.process(input);

        let mut sample = input;
        if let Some(threshold) = self.gate_threshold
            && f64::from(sample.abs()) < threshold
        {
            sample = 0.0;
        }

        sample *= self.input_gain;

        if !self.bypassed {
            if let Some(model) = self.model {
                sample = model.process(sample);
            }
            sample = self.voicing.apply(sample);

            if let Some(ir) = self.impulse_response {
                sample = ir.apply(sample);
            }

            sample = self.mix(sample, dry);
        }

        sample *= self.output_gain;
        if self.limiter_enabled {
            sample = limit(sample);
        }

        meters.output.process(sample);
        sample
    }

    /// Processes `input` into the front of `output`; extra output is untouched.
    pub fn process_block(&self, input: &[f32], output: &mut [f32], meters: &mut ChainMeters) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process(sample, meters);
        }
    }

    #[inline]
    fn mix(&self, wet: f32, dry: f32) -> f32 {
        f64::from(wet).mul_add(
            self.wet_dry_mix,
            f64::from(dry) * (1.0 - self.wet_dry_mix),
        ) as f32
    }
}

/// Hard clip to [-1, 1]. NaN, e.g. silence times an infinite gain, is muted.
#[inline]
fn limit(sample: f32) -> f32 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    }
}
