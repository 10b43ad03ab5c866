use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::audio::AudioEngine;
use crate::audio::engine::SAMPLE_RATE;
use crate::io::wav;

/// Frames handed to the engine per call, matching a typical device period.
pub const BLOCK_FRAMES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceReport {
    pub frames: usize,
    pub sample_rate: u32,
    pub peak: f32,
}

/// Renders `input` through `engine` into a float WAV at `output`.
///
/// The file keeps its sample rate; the engine has no time-dependent stages.
pub fn bounce_file(engine: &AudioEngine, input: &Path, output: &Path) -> Result<BounceReport> {
    let clip = wav::read_mono(input)
        .with_context(|| format!("failed to read '{}'", input.display()))?;

    if clip.sample_rate != SAMPLE_RATE {
        warn!(
            "'{}' is {} Hz, the engine is voiced for {} Hz",
            input.display(),
            clip.sample_rate,
            SAMPLE_RATE
        );
    }

    let processed = bounce_samples(engine, &clip.samples);
    wav::write_mono(output, &processed, clip.sample_rate)
        .with_context(|| format!("failed to write '{}'", output.display()))?;

    let report = BounceReport {
        frames: processed.len(),
        sample_rate: clip.sample_rate,
        peak: processed.iter().fold(0.0f32, |peak, s| peak.max(s.abs())),
    };

    info!(
        "Bounced {} frames to {} (peak {:.3})",
        report.frames,
        output.display(),
        report.peak
    );
    Ok(report)
}

/// Processes `samples` in [`BLOCK_FRAMES`] chunks.
pub fn bounce_samples(engine: &AudioEngine, samples: &[f32]) -> Vec<f32> {
    let mut processed = vec![0.0; samples.len()];
    for (input, output) in samples
        .chunks(BLOCK_FRAMES)
        .zip(processed.chunks_mut(BLOCK_FRAMES))
    {
        engine.process_into(input, output);
    }
    processed
}

/// Timestamped file name for a bounce written into `dir`.
pub fn default_output_path(dir: &Path) -> PathBuf {
    dir.join(format!(
        "bounce_{}.wav",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}
