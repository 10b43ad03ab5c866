use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::{AmplifierModel, DEFAULT_MODEL_SAMPLE_RATE, TransferCurveModel};
use crate::error::LoadError;

/// Produces amplifier models off the real-time path.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn AmplifierModel>, LoadError>;
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    name: Option<String>,
    sample_rate: Option<u32>,
    #[serde(default)]
    curve: Vec<f32>,
}

/// Loads JSON transfer-curve models from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileModelLoader;

impl FileModelLoader {
    pub fn load_curve(path: &Path) -> Result<TransferCurveModel, LoadError> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| LoadError::invalid(path, e))?;
        let file: ModelFile =
            serde_json::from_str(&content).map_err(|e| LoadError::invalid(path, e))?;

        if let Some(bad) = file.curve.iter().find(|v| !v.is_finite()) {
            return Err(LoadError::invalid(
                path,
                format!("curve contains a non-finite point: {bad}"),
            ));
        }

        let name = file.name.unwrap_or_else(|| file_stem(path));
        let sample_rate = file.sample_rate.unwrap_or(DEFAULT_MODEL_SAMPLE_RATE);

        debug!(
            "Loaded model '{}' ({} curve points, {} Hz)",
            name,
            file.curve.len(),
            sample_rate
        );

        Ok(TransferCurveModel::new(name, sample_rate, file.curve))
    }
}

impl ModelLoader for FileModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn AmplifierModel>, LoadError> {
        Ok(Arc::new(Self::load_curve(path)?))
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_not_found() {
        let err = FileModelLoader
            .load(Path::new("/definitely/not/here.json"))
            .err();
        assert!(matches!(err, Some(LoadError::NotFound(_))));
    }

    #[test]
    fn test_loads_curve_with_defaults() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("plexi.json");
        fs::write(&path, r#"{ "curve": [-0.8, 0.0, 0.8] }"#)?;

        let model = FileModelLoader.load(&path)?;
        assert_eq!(model.name(), "plexi");
        assert_eq!(model.sample_rate(), DEFAULT_MODEL_SAMPLE_RATE);
        assert!((model.process(1.0) - 0.8).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_declared_name_and_rate_win() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("file.json");
        fs::write(
            &path,
            r#"{ "name": "Recto", "sample_rate": 44100, "curve": [] }"#,
        )?;

        let model = FileModelLoader.load(&path)?;
        assert_eq!(model.name(), "Recto");
        assert_eq!(model.sample_rate(), 44_100);
        assert_eq!(model.process(0.3), 0.3);
        Ok(())
    }

    #[test]
    fn test_garbage_is_invalid() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("broken.json");
        fs::write(&path, "not json")?;

        let err = FileModelLoader.load(&path).err();
        assert!(matches!(err, Some(LoadError::Invalid { .. })));
        Ok(())
    }
}
