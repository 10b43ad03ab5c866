use std::sync::atomic::{AtomicU64, Ordering};

/// Level reported for silence, and the floor of every estimate.
pub const SILENCE_DB: f64 = -120.0;

/// Magnitudes at or below this are treated as silence.
const SILENCE_THRESHOLD: f64 = 1e-9;

/// Per-sample multiplier applied to the previous estimate.
const DECAY: f64 = 0.9;

/// Instantaneous level of a single sample in dB.
#[inline]
pub fn instantaneous_db(sample: f32) -> f64 {
    let magnitude = f64::from(sample.abs());
    if magnitude <= SILENCE_THRESHOLD {
        SILENCE_DB
    } else {
        20.0 * magnitude.log10()
    }
}

/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Peak-decay level estimate for one channel.
///
/// Rises to a louder sample immediately and otherwise follows
/// `level * 0.9`, never reporting less than [`SILENCE_DB`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelMeter {
    level: f64,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelMeter {
    pub const fn new() -> Self {
        Self { level: SILENCE_DB }
    }

    pub const fn with_level(level: f64) -> Self {
        Self { level }
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f64 {
        self.level = (self.level * DECAY).max(instantaneous_db(sample));
        self.level
    }

    pub const fn level(&self) -> f64 {
        self.level
    }
}

/// Input and output level estimates in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample {
    pub input_db: f64,
    pub output_db: f64,
}

impl Default for LevelSample {
    fn default() -> Self {
        Self {
            input_db: SILENCE_DB,
            output_db: SILENCE_DB,
        }
    }
}

/// Lock-free home of the latest [`LevelSample`].
///
/// Written by the processing path, read by the level reporter. The two
/// channels are stored independently, so a reader may see an input level
/// from one block and an output level from the next.
#[derive(Debug)]
pub struct LevelCell {
    input: AtomicU64,
    output: AtomicU64,
}

impl Default for LevelCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelCell {
    pub fn new() -> Self {
        Self {
            input: AtomicU64::new(SILENCE_DB.to_bits()),
            output: AtomicU64::new(SILENCE_DB.to_bits()),
        }
    }

    pub fn load(&self) -> LevelSample {
        LevelSample {
            input_db: f64::from_bits(self.input.load(Ordering::Relaxed)),
            output_db: f64::from_bits(self.output.load(Ordering::Relaxed)),
        }
    }

    pub fn store(&self, sample: LevelSample) {
        self.input
            .store(sample.input_db.to_bits(), Ordering::Relaxed);
        self.output
            .store(sample.output_db.to_bits(), Ordering::Relaxed);
    }

    /// Meters seeded with the stored estimates, for a block of processing.
    pub fn meters(&self) -> (LevelMeter, LevelMeter) {
        let sample = self.load();
        (
            LevelMeter::with_level(sample.input_db),
            LevelMeter::with_level(sample.output_db),
        )
    }

    pub fn commit(&self, input: &LevelMeter, output: &LevelMeter) {
        self.store(LevelSample {
            input_db: input.level(),
            output_db: output.level(),
        });
    }
}
