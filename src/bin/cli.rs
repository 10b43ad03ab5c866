use ampstudio::audio::engine::SAMPLE_RATE;
use ampstudio::audio::jack::JackSinkProvider;
use ampstudio::audio::sink::NoPlayback;
use ampstudio::audio::{AudioEngine, EngineConfiguration};
use ampstudio::io::{bounce, wav};
use ampstudio::ir::loader::scan_ir_directory;
use ampstudio::ir::{ImpulseResponseLoader, WavIrLoader};
use ampstudio::model::{FileModelLoader, ModelLoader};
use ampstudio::preset::{self, Preset};
use ampstudio::settings::Settings;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

/// How far ahead of real time `play` keeps the playback buffer.
const PLAYBACK_LEAD: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "ampstudio")]
#[command(version)]
#[command(about = "A single-channel amp engine with cabinet IR and JACK playback.")]
struct Args {
    #[arg(long, env = "AMPSTUDIO_PRESET_DIR", help = "Directory holding presets")]
    preset_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a WAV file through the engine to JACK
    Play {
        input: PathBuf,
        #[arg(long = "loop", help = "Repeat the file until Ctrl+C")]
        repeat: bool,
        #[command(flatten)]
        rig: RigArgs,
    },
    /// Render a WAV file through the engine offline
    Bounce {
        input: PathBuf,
        #[arg(long, help = "Output file (default: timestamped file in the bounce directory)")]
        output: Option<PathBuf>,
        #[command(flatten)]
        rig: RigArgs,
    },
    /// Manage presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },
    /// List impulse responses in the IR directory
    Irs,
}

#[derive(Subcommand, Debug)]
enum PresetAction {
    List,
    Save {
        name: String,
        #[command(flatten)]
        rig: RigArgs,
    },
    Delete {
        name: String,
    },
    Rename {
        old_name: String,
        new_name: String,
    },
    /// Make a preset the default for `play` and `bounce`
    Select {
        name: String,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RigArgs {
    #[arg(long, help = "Start from a saved preset")]
    preset: Option<String>,
    #[arg(long, help = "Amplifier model file (path or name in the model directory)")]
    model: Option<PathBuf>,
    #[arg(long, help = "Impulse response WAV (path or name in the IR directory)")]
    ir: Option<PathBuf>,
    #[arg(long, help = "Skip the amp, cabinet and mix stages")]
    bypass: bool,
    #[arg(long, allow_hyphen_values = true, value_name = "DB")]
    input_gain: Option<f64>,
    #[arg(long, allow_hyphen_values = true, value_name = "DB")]
    output_gain: Option<f64>,
    #[arg(long, value_name = "0..1")]
    mix: Option<f64>,
    #[arg(long)]
    tone: Option<f64>,
    #[arg(long)]
    drive: Option<f64>,
    #[arg(long)]
    presence: Option<f64>,
    #[arg(long)]
    master: Option<f64>,
    #[arg(
        long,
        allow_hyphen_values = true,
        value_name = "DB",
        help = "Enable the noise gate at this threshold"
    )]
    gate: Option<f64>,
    #[arg(long)]
    no_limiter: bool,
}

/// Configuration and capability paths resolved from a preset and flags.
#[derive(Debug)]
struct Rig {
    name: String,
    config: EngineConfiguration,
    model_path: Option<PathBuf>,
    ir_path: Option<PathBuf>,
    bypass: bool,
}

impl RigArgs {
    fn resolve(&self, settings: &Settings, presets: &preset::Manager) -> Result<Rig> {
        let preset_name = self.preset.as_ref().or(settings.selected_preset.as_ref());
        let base = match preset_name {
            Some(name) => presets
                .get_preset_by_name(name)
                .cloned()
                .with_context(|| format!("preset '{name}' not found"))?,
            None => Preset::default(),
        };

        let mut config = base.configuration();
        let overrides = [
            (&mut config.input_gain_db, self.input_gain),
            (&mut config.output_gain_db, self.output_gain),
            (&mut config.wet_dry_mix, self.mix),
            (&mut config.tone, self.tone),
            (&mut config.drive, self.drive),
            (&mut config.presence, self.presence),
            (&mut config.master_volume, self.master),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(threshold) = self.gate {
            config.noise_gate_enabled = true;
            config.noise_gate_threshold_db = threshold;
        }
        if self.no_limiter {
            config.limiter_enabled = false;
        }

        let model_path = self
            .model
            .clone()
            .or_else(|| base.model_path().map(PathBuf::from))
            .map(|p| locate(&p, &settings.model_dir));
        let ir_path = self
            .ir
            .clone()
            .or_else(|| base.ir_path().map(PathBuf::from))
            .map(|p| locate(&p, &settings.ir_dir));

        Ok(Rig {
            name: base.name,
            config: config.normalized(),
            model_path,
            ir_path,
            bypass: self.bypass,
        })
    }
}

impl Rig {
    fn apply(&self, engine: &AudioEngine) -> Result<()> {
        engine.configure(self.config);
        engine.set_bypassed(self.bypass);

        if let Some(path) = &self.model_path {
            let model = FileModelLoader.load(path)?;
            info!("Loaded model: {}", model.name());
            engine.set_model(model);
        }

        if let Some(path) = &self.ir_path {
            let ir = WavIrLoader::new(SAMPLE_RATE).load(path)?;
            info!("Loaded IR: {} ({} taps)", ir.name(), ir.taps().len());
            engine.set_impulse_response(ir);
        }

        debug!("Rig '{}':\n{}", self.name, self.config);
        Ok(())
    }

    fn to_preset(&self, name: &str) -> Preset {
        let path_string = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        Preset::from_configuration(
            name,
            &self.config,
            path_string(&self.model_path),
            path_string(&self.ir_path),
        )
    }
}

/// Uses `path` as given if it exists, otherwise looks for it under `dir`.
fn locate(path: &Path, dir: &str) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }
    let candidate = Path::new(dir).join(path);
    if candidate.exists() {
        candidate
    } else {
        path.to_path_buf()
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    info!("ampstudio v{}", env!("CARGO_PKG_VERSION"));
    debug!("Args: {args:?}");

    let mut settings = Settings::load().context("failed to load settings")?;
    if let Some(dir) = args.preset_dir {
        settings.preset_dir = dir;
    }
    debug!("{settings}");

    let mut presets =
        preset::Manager::new(&settings.preset_dir).context("failed to open preset directory")?;

    match args.command {
        Command::Play { input, repeat, rig } => {
            let rig = rig.resolve(&settings, &presets)?;
            play(&settings, &input, repeat, &rig)
        }
        Command::Bounce { input, output, rig } => {
            let rig = rig.resolve(&settings, &presets)?;
            let engine = AudioEngine::new(NoPlayback);
            rig.apply(&engine)?;

            let output = match output {
                Some(path) => path,
                None => {
                    std::fs::create_dir_all(&settings.bounce_dir)
                        .context("failed to create bounce directory")?;
                    bounce::default_output_path(Path::new(&settings.bounce_dir))
                }
            };
            let report = bounce::bounce_file(&engine, &input, &output)?;
            println!(
                "{} -> {} ({} frames, peak {:.3})",
                input.display(),
                output.display(),
                report.frames,
                report.peak
            );
            Ok(())
        }
        Command::Presets { action } => match action {
            PresetAction::List => {
                for preset in presets.get_presets() {
                    println!("{}", preset.name);
                }
                Ok(())
            }
            PresetAction::Save { name, rig } => {
                let rig = rig.resolve(&settings, &presets)?;
                presets.save_preset(&rig.to_preset(&name))?;
                info!("Saved preset '{name}'");
                Ok(())
            }
            PresetAction::Delete { name } => {
                presets.delete_preset(&name)?;
                info!("Deleted preset '{name}'");
                Ok(())
            }
            PresetAction::Rename { old_name, new_name } => {
                presets.rename_preset(&old_name, &new_name)?;
                info!("Renamed preset '{old_name}' to '{new_name}'");
                Ok(())
            }
            PresetAction::Select { name } => {
                if !presets.preset_exists(&name) {
                    anyhow::bail!("preset '{name}' not found");
                }
                // reload so command line overrides are not persisted
                let mut stored = Settings::load().context("failed to load settings")?;
                stored.selected_preset = Some(name);
                stored.save().context("failed to save settings")?;
                info!("Selected preset saved to settings");
                Ok(())
            }
        },
        Command::Irs => {
            for (name, _) in scan_ir_directory(Path::new(&settings.ir_dir))? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn play(settings: &Settings, input: &Path, repeat: bool, rig: &Rig) -> Result<()> {
    let clip = wav::read_mono(input)
        .with_context(|| format!("failed to read '{}'", input.display()))?;
    if clip.samples.is_empty() {
        anyhow::bail!("'{}' contains no audio", input.display());
    }
    if clip.sample_rate != SAMPLE_RATE {
        info!(
            "Resampling '{}' from {} Hz to {} Hz",
            input.display(),
            clip.sample_rate,
            SAMPLE_RATE
        );
    }
    // the sink always plays at the engine rate
    let clip = clip.resampled(SAMPLE_RATE)?;

    let engine = AudioEngine::new(JackSinkProvider::new(
        settings.audio.client_name.clone(),
        settings.audio.playback_ports.clone(),
    ));
    rig.apply(&engine)?;

    let levels = engine.subscribe_levels();
    engine.start().context("failed to start audio engine")?;

    let running = Arc::new(AtomicBool::new(true));
    let shutdown_flag = Arc::clone(&running);

    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        shutdown_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;

    let rate = f64::from(SAMPLE_RATE);
    let started = Instant::now();
    let mut fed_frames = 0usize;
    let mut position = 0usize;

    while running.load(Ordering::SeqCst) {
        if position >= clip.samples.len() {
            if !repeat {
                break;
            }
            position = 0;
        }

        let end = (position + bounce::BLOCK_FRAMES).min(clip.samples.len());
        engine.feed_samples(&clip.samples[position..end]);
        fed_frames += end - position;
        position = end;

        for sample in levels.try_iter() {
            debug!(
                "Levels: in {:.1} dB, out {:.1} dB",
                sample.input_db, sample.output_db
            );
        }

        let due = started + Duration::from_secs_f64(fed_frames as f64 / rate);
        if let Some(wait) = due.checked_duration_since(Instant::now() + PLAYBACK_LEAD) {
            thread::sleep(wait);
        }
    }

    if running.load(Ordering::SeqCst) {
        // let the queued tail play out
        thread::sleep(PLAYBACK_LEAD * 2);
    }

    engine.stop();

    let dropped = engine.dropped_samples();
    if dropped > 0 {
        warn!("{dropped} samples were dropped because the playback buffer was full");
    }
    Ok(())
}
