use anyhow::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ImpulseResponse;
use crate::error::LoadError;
use crate::io::wav;
use crate::model::loader::file_stem;

/// Longest response kept, in seconds of source audio.
const MAX_IR_LENGTH_SECONDS: usize = 1;

/// Produces impulse responses off the real-time path.
pub trait ImpulseResponseLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<ImpulseResponse>, LoadError>;
}

/// Reads WAV impulse responses, down-mixed to mono and resampled to the
/// engine rate.
#[derive(Debug, Clone, Copy)]
pub struct WavIrLoader {
    target_sample_rate: u32,
}

impl WavIrLoader {
    pub const fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn load_taps(&self, path: &Path) -> Result<Vec<f32>> {
        let clip = wav::read_mono_limited(path, Some(MAX_IR_LENGTH_SECONDS))?;

        if clip.sample_rate != self.target_sample_rate && !clip.samples.is_empty() {
            debug!(
                "Resampling IR from {} Hz to {} Hz",
                clip.sample_rate, self.target_sample_rate
            );
            wav::resample(&clip.samples, clip.sample_rate, self.target_sample_rate)
        } else {
            Ok(clip.samples)
        }
    }
}

impl ImpulseResponseLoader for WavIrLoader {
    fn load(&self, path: &Path) -> Result<Arc<ImpulseResponse>, LoadError> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let taps = self
            .load_taps(path)
            .map_err(|e| LoadError::invalid(path, e))?;

        debug!("Loaded IR {:?} with {} taps", path, taps.len());

        Ok(Arc::new(ImpulseResponse::new(file_stem(path), taps)))
    }
}

/// Lists the WAV files under `directory`, keyed by their path relative to it.
///
/// Shallower files sort first, then by name.
pub fn scan_ir_directory(directory: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    if !directory.exists() {
        return Ok(found);
    }

    scan_recursive(directory, directory, &mut found)?;

    found.sort_by(|a, b| {
        let a_sep_count = a.0.matches('/').count();
        let b_sep_count = b.0.matches('/').count();
        a_sep_count.cmp(&b_sep_count).then_with(|| a.0.cmp(&b.0))
    });

    debug!("Found {} impulse response files", found.len());
    Ok(found)
}

fn scan_recursive(
    current_dir: &Path,
    base_dir: &Path,
    found: &mut Vec<(String, PathBuf)>,
) -> Result<()> {
    for entry in fs::read_dir(current_dir)? {
        let path = entry?.path();

        if path.is_dir() {
            scan_recursive(&path, base_dir, found)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("wav") {
            let relative_path = path
                .strip_prefix(base_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            found.push((relative_path, path));
        }
    }
    Ok(())
}
