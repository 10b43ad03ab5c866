pub mod loader;

pub use loader::{ImpulseResponseLoader, WavIrLoader};

/// Cabinet impulse response applied as a same-instant weighted sum.
///
/// Every tap weights the current sample; there is no delay line. Because of
/// that the whole response collapses to the sum of its taps, which is
/// computed once here rather than per sample.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    name: String,
    taps: Vec<f32>,
    tap_sum: f32,
}

impl ImpulseResponse {
    pub fn new(name: impl Into<String>, taps: Vec<f32>) -> Self {
        let tap_sum = taps.iter().fold(0.0f32, |acc, &tap| acc + tap);
        Self {
            name: name.into(),
            taps,
            tap_sum,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Applies every tap to `sample`; an empty response passes it through.
    #[inline]
    pub fn apply(&self, sample: f32) -> f32 {
        if self.taps.is_empty() {
            sample
        } else {
            sample * self.tap_sum
        }
    }
}
