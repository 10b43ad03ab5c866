use anyhow::{Context, Result, anyhow};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;

/// Mono audio read from or written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoClip {
    /// Converts the clip to `sample_rate`, returning it unchanged if it
    /// already matches.
    pub fn resampled(self, sample_rate: u32) -> Result<Self> {
        if self.sample_rate == sample_rate {
            return Ok(self);
        }

        debug!(
            "Resampling {} samples from {} Hz to {} Hz",
            self.samples.len(),
            self.sample_rate,
            sample_rate
        );
        Ok(Self {
            samples: resample(&self.samples, self.sample_rate, sample_rate)?,
            sample_rate,
        })
    }
}

/// Reads a WAV file, averaging channels down to mono.
pub fn read_mono(path: &Path) -> Result<MonoClip> {
    read_mono_limited(path, None)
}

/// Like [`read_mono`], keeping at most `max_seconds` of audio.
pub fn read_mono_limited(path: &Path, max_seconds: Option<usize>) -> Result<MonoClip> {
    let reader = WavReader::open(path).context("Failed to open WAV file")?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let max_samples = max_seconds.map_or(usize::MAX, |seconds| {
        seconds
            .saturating_mul(spec.sample_rate as usize)
            .saturating_mul(channels)
    });

    let samples: Vec<f32> = if spec.sample_format == SampleFormat::Float {
        reader
            .into_samples::<f32>()
            .take(max_samples)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read float samples")?
    } else {
        let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
        reader
            .into_samples::<i32>()
            .take(max_samples)
            .map(|s| s.map(|v| v as f32 / max_val))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read integer samples")?
    };

    let samples = if channels > 1 {
        samples
            .chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    Ok(MonoClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Writes 32-bit float mono.
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file '{}'", path.display()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .context("Failed to write sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Converts `samples` from `from_rate` to `to_rate` with a sinc resampler.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = f64::from(to_rate) / f64::from(from_rate);

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)?;

    let input = vec![samples.to_vec()];
    let output = resampler.process(&input, None)?;

    output
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Resampling failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_float_file_survives_write_and_read() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("clip.wav");
        write_mono(&path, &[0.0, 0.5, -0.25], 44_100)?;

        let clip = read_mono(&path)?;
        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.samples, vec![0.0, 0.5, -0.25]);
        Ok(())
    }

    #[test]
    fn test_int_stereo_is_normalised_and_mixed() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("di.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec)?;
        for s in [16_384i16, 0, -16_384, -16_384] {
            writer.write_sample(s)?;
        }
        writer.finalize()?;

        let clip = read_mono(&path)?;
        assert_eq!(clip.samples, vec![0.25, -0.5]);
        Ok(())
    }

    #[test]
    fn test_frame_limit() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("long.wav");
        write_mono(&path, &[0.1; 100], 8)?;

        let clip = read_mono_limited(&path, Some(2))?;
        assert_eq!(clip.samples.len(), 16);
        Ok(())
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(read_mono(Path::new("/nope/none.wav")).is_err());
    }

    #[test]
    fn test_resample_halves_length() -> Result<()> {
        let input: Vec<f32> = (0..48000).map(|x| (x as f32).sin()).collect();
        let output = resample(&input, 48000, 24000)?;

        // not exactly half, but close
        assert!(output.len() > 23000 && output.len() < 25000);
        Ok(())
    }

    #[test]
    fn test_resample_same_rate_unchanged() -> Result<()> {
        let input: Vec<f32> = (0..1000).map(|x| (x as f32).sin()).collect();
        let output = resample(&input, 48000, 48000)?;

        assert_eq!(output, input);
        Ok(())
    }

    #[test]
    fn test_clip_resampled_to_engine_rate() -> Result<()> {
        let clip = MonoClip {
            samples: (0..44_100).map(|x| (x as f32 * 0.01).sin() * 0.5).collect(),
            sample_rate: 44_100,
        };

        let clip = clip.resampled(48_000)?;
        assert_eq!(clip.sample_rate, 48_000);
        // one second of audio stays roughly one second long
        assert!(clip.samples.len() > 47_000 && clip.samples.len() < 49_000);
        Ok(())
    }

    #[test]
    fn test_clip_at_target_rate_is_untouched() -> Result<()> {
        let clip = MonoClip {
            samples: vec![0.1, 0.2, 0.3],
            sample_rate: 48_000,
        };
        assert_eq!(clip.clone().resampled(48_000)?, clip);
        Ok(())
    }
}
