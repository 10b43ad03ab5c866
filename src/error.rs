use std::path::PathBuf;

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the engine lifecycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("playback sink unavailable: {source}")]
    SinkUnavailable {
        #[source]
        source: BoxedSource,
    },

    #[error("failed to spawn level reporter: {0}")]
    Scheduler(#[from] std::io::Error),
}

impl EngineError {
    pub fn sink_unavailable(source: impl Into<BoxedSource>) -> Self {
        Self::SinkUnavailable {
            source: source.into(),
        }
    }
}

/// Errors returned by the model and impulse response loaders.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load '{}': {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: BoxedSource,
    },
}

impl LoadError {
    pub fn invalid(path: impl Into<PathBuf>, source: impl Into<BoxedSource>) -> Self {
        Self::Invalid {
            path: path.into(),
            source: source.into(),
        }
    }
}
