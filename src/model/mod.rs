pub mod loader;

pub use loader::{FileModelLoader, ModelLoader};

/// Sample rate assumed for models that do not declare one.
pub const DEFAULT_MODEL_SAMPLE_RATE: u32 = 48_000;

/// An amplifier model the engine calls once per sample.
///
/// Models are immutable once built. The engine holds them behind an `Arc`
/// and replaces the whole handle when a new one is loaded.
pub trait AmplifierModel: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    fn process(&self, sample: f32) -> f32;
}

/// Static transfer function sampled uniformly over [-1, 1].
///
/// Samples between points are linearly interpolated, samples outside the
/// range take the nearest end point. An empty curve passes samples through.
#[derive(Debug, Clone)]
pub struct TransferCurveModel {
    name: String,
    sample_rate: u32,
    curve: Vec<f32>,
}

impl TransferCurveModel {
    pub fn new(name: impl Into<String>, sample_rate: u32, curve: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            curve,
        }
    }
}

impl AmplifierModel for TransferCurveModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    fn process(&self, sample: f32) -> f32 {
        match self.curve.len() {
            0 => sample,
            1 => self.curve[0],
            len => {
                let last = len - 1;
                let position = (sample.clamp(-1.0, 1.0) + 1.0) * 0.5 * last as f32;
                if position.is_nan() {
                    return sample;
                }

                let index = (position.floor() as usize).min(last - 1);
                let frac = position - index as f32;
                let a = self.curve[index];
                let b = self.curve[index + 1];
                frac.mul_add(b - a, a)
            }
        }
    }
}
