use arc_swap::{ArcSwap, ArcSwapOption};
use crossbeam::channel::Receiver;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::audio::chain::{ChainMeters, SignalChain};
use crate::audio::config::EngineConfiguration;
use crate::audio::level_meter::{LevelCell, LevelSample};
use crate::audio::reporter::{LevelReporter, LevelSubscribers};
use crate::audio::sink::{PlaybackSink, SampleBuffer, SinkProvider, StreamFormat};
use crate::error::EngineError;
use crate::ir::ImpulseResponse;
use crate::model::AmplifierModel;

pub const SAMPLE_RATE: u32 = 48_000;

/// Format every sink is initialised with.
pub const PLAYBACK_FORMAT: StreamFormat = StreamFormat {
    sample_rate: SAMPLE_RATE,
    channels: 1,
};

/// Capacity of the queue between `feed_samples` and the sink.
pub const PLAYBACK_BUFFER: Duration = Duration::from_secs(5);

pub const LEVEL_REPORT_INTERVAL: Duration = Duration::from_millis(100);

type SharedModel = Arc<dyn AmplifierModel>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

/// Everything guarded by the lifecycle lock.
#[derive(Default)]
struct Lifecycle {
    state: EngineState,
    sink: Option<Box<dyn PlaybackSink>>,
    reporter: Option<LevelReporter>,
}

/// Single-channel amp engine shared between a processing context and a
/// control context.
///
/// Configuration, model and impulse response are swapped atomically and read
/// without locking on every processed block. Only `start`/`stop` take the
/// lifecycle lock.
pub struct AudioEngine {
    config: ArcSwap<EngineConfiguration>,
    model: ArcSwapOption<SharedModel>,
    impulse_response: ArcSwapOption<ImpulseResponse>,
    bypassed: AtomicBool,
    levels: Arc<LevelCell>,
    subscribers: Arc<LevelSubscribers>,
    /// Present only while running.
    playback: ArcSwapOption<SampleBuffer>,
    dropped_samples: AtomicU64,
    sink_provider: Box<dyn SinkProvider>,
    lifecycle: Mutex<Lifecycle>,
}

impl AudioEngine {
    pub fn new(sink_provider: impl SinkProvider + 'static) -> Self {
        Self::with_configuration(sink_provider, EngineConfiguration::default())
    }

    pub fn with_configuration(
        sink_provider: impl SinkProvider + 'static,
        config: EngineConfiguration,
    ) -> Self {
        Self {
            config: ArcSwap::from_pointee(config.normalized()),
            model: ArcSwapOption::empty(),
            impulse_response: ArcSwapOption::empty(),
            bypassed: AtomicBool::new(false),
            levels: Arc::new(LevelCell::new()),
            subscribers: Arc::new(LevelSubscribers::default()),
            playback: ArcSwapOption::empty(),
            dropped_samples: AtomicU64::new(0),
            sink_provider: Box::new(sink_provider),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Replaces the whole configuration; the next processed block sees it.
    pub fn configure(&self, config: EngineConfiguration) {
        self.config.store(Arc::new(config.normalized()));
        debug!("Engine configuration replaced");
    }

    pub fn configuration(&self) -> EngineConfiguration {
        **self.config.load()
    }

    pub fn set_model(&self, model: Arc<dyn AmplifierModel>) {
        debug!(
            "Amplifier model set to '{}' ({} Hz)",
            model.name(),
            model.sample_rate()
        );
        if model.sample_rate() != SAMPLE_RATE {
            warn!(
                "Model '{}' was captured at {} Hz, engine runs at {} Hz",
                model.name(),
                model.sample_rate(),
                SAMPLE_RATE
            );
        }
        self.model.store(Some(Arc::new(model)));
    }

    pub fn clear_model(&self) {
        self.model.store(None);
        debug!("Amplifier model cleared");
    }

    pub fn model(&self) -> Option<Arc<dyn AmplifierModel>> {
        self.model.load().as_deref().cloned()
    }

    pub fn set_impulse_response(&self, impulse_response: Arc<ImpulseResponse>) {
        debug!(
            "Impulse response set to '{}' ({} taps)",
            impulse_response.name(),
            impulse_response.taps().len()
        );
        self.impulse_response.store(Some(impulse_response));
    }

    pub fn clear_impulse_response(&self) {
        self.impulse_response.store(None);
        debug!("Impulse response cleared");
    }

    pub fn impulse_response(&self) -> Option<Arc<ImpulseResponse>> {
        self.impulse_response.load_full()
    }

    pub fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, Ordering::Release);
        debug!("Bypass: {bypassed}");
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Acquire)
    }

    /// Runs `input` through the signal chain.
    ///
    /// Does not touch the lifecycle and works whether or not the engine is
    /// running.
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let mut output = vec![0.0; input.len()];
        self.process_into(input, &mut output);
        output
    }

    /// Allocation-free form of [`process`](Self::process). Only the first
    /// `min(input.len(), output.len())` samples are written.
    pub fn process_into(&self, input: &[f32], output: &mut [f32]) {
        if input.is_empty() {
            return;
        }

        let config = self.config.load();
        let model = self.model.load();
        let impulse_response = self.impulse_response.load();

        let chain = SignalChain::new(
            &config,
            model.as_deref().map(|model| &**model),
            impulse_response.as_deref(),
            self.is_bypassed(),
        );

        let (input_meter, output_meter) = self.levels.meters();
        let mut meters = ChainMeters {
            input: input_meter,
            output: output_meter,
        };

        chain.process_block(input, output, &mut meters);
        self.levels.commit(&meters.input, &meters.output);
    }

    /// Processes `input` and queues the result for playback.
    /// Does nothing unless the engine is running.
    pub fn feed_samples(&self, input: &[f32]) {
        let playback = self.playback.load();
        let Some(buffer) = playback.as_deref() else {
            return;
        };

        let output = self.process(input);
        let dropped = buffer.enqueue(&output);
        if dropped > 0 {
            self.dropped_samples
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    /// Samples discarded because the playback buffer was full.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    /// Latest level estimates.
    pub fn levels(&self) -> LevelSample {
        self.levels.load()
    }

    /// Receives the current levels every [`LEVEL_REPORT_INTERVAL`] while
    /// the engine is running.
    pub fn subscribe_levels(&self) -> Receiver<LevelSample> {
        self.subscribers.subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.lock_lifecycle().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Acquires the playback sink, starts playback and the level reporter.
    ///
    /// A no-op when already running. On failure anything acquired so far is
    /// released and the engine stays stopped.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.state == EngineState::Running {
            debug!("Engine already running, ignoring start request");
            return Ok(());
        }

        let buffer = SampleBuffer::new(PLAYBACK_FORMAT, PLAYBACK_BUFFER);

        let mut sink = self
            .sink_provider
            .acquire()
            .map_err(EngineError::sink_unavailable)?;

        if let Err(e) = open_sink(sink.as_mut(), buffer.clone()) {
            close_sink(sink.as_mut());
            return Err(EngineError::sink_unavailable(e));
        }

        let reporter = match LevelReporter::spawn(
            Arc::clone(&self.levels),
            Arc::clone(&self.subscribers),
            LEVEL_REPORT_INTERVAL,
        ) {
            Ok(reporter) => reporter,
            Err(e) => {
                close_sink(sink.as_mut());
                return Err(e.into());
            }
        };

        self.playback.store(Some(Arc::new(buffer)));
        lifecycle.sink = Some(sink);
        lifecycle.reporter = Some(reporter);
        lifecycle.state = EngineState::Running;

        info!(
            "Audio engine started ({} Hz, {} channel)",
            PLAYBACK_FORMAT.sample_rate, PLAYBACK_FORMAT.channels
        );
        Ok(())
    }

    /// Stops and releases the sink and stops the level reporter.
    /// A no-op when already stopped.
    pub fn stop(&self) {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.state == EngineState::Stopped {
            debug!("Engine already stopped, ignoring stop request");
            return;
        }

        self.playback.store(None);

        if let Some(mut sink) = lifecycle.sink.take() {
            close_sink(sink.as_mut());
        }

        if let Some(reporter) = lifecycle.reporter.take() {
            reporter.stop();
        }

        lifecycle.state = EngineState::Stopped;
        info!("Audio engine stopped");
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_sink(sink: &mut dyn PlaybackSink, buffer: SampleBuffer) -> anyhow::Result<()> {
    sink.init(PLAYBACK_FORMAT, buffer)?;
    sink.play()
}

fn close_sink(sink: &mut dyn PlaybackSink) {
    sink.stop();
    sink.release();
}
