pub mod chain;
pub mod config;
pub mod engine;
pub mod jack;
pub mod level_meter;
pub mod reporter;
pub mod sink;

pub use config::EngineConfiguration;
pub use engine::{AudioEngine, EngineState};
pub use level_meter::LevelSample;
