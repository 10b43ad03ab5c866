use ampstudio::audio::engine::LEVEL_REPORT_INTERVAL;
use ampstudio::audio::sink::{PlaybackSink, SampleBuffer, SinkProvider, StreamFormat};
use ampstudio::audio::{AudioEngine, EngineConfiguration, EngineState};
use ampstudio::error::EngineError;
use ampstudio::ir::ImpulseResponse;
use ampstudio::model::TransferCurveModel;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Acquire,
    Init,
    Play,
    Stop,
    Release,
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    buffer: Arc<Mutex<Option<SampleBuffer>>>,
}

impl Recorder {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, event: Event) -> usize {
        self.events().iter().filter(|&&e| e == event).count()
    }

    fn buffer(&self) -> Option<SampleBuffer> {
        self.buffer.lock().unwrap().clone()
    }
}

#[derive(Default, Clone, Copy)]
enum Failure {
    #[default]
    None,
    Acquire,
    Init,
    Play,
}

struct RecordingSink {
    recorder: Recorder,
    failure: Failure,
}

impl PlaybackSink for RecordingSink {
    fn init(&mut self, format: StreamFormat, buffer: SampleBuffer) -> Result<()> {
        self.recorder.push(Event::Init);
        assert_eq!(format.sample_rate, 48_000);
        assert_eq!(format.channels, 1);
        if matches!(self.failure, Failure::Init) {
            anyhow::bail!("device busy");
        }
        *self.recorder.buffer.lock().unwrap() = Some(buffer);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.recorder.push(Event::Play);
        if matches!(self.failure, Failure::Play) {
            anyhow::bail!("stream refused to start");
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.recorder.push(Event::Stop);
    }

    fn release(&mut self) {
        self.recorder.push(Event::Release);
    }
}

struct RecordingProvider {
    recorder: Recorder,
    failure: Failure,
}

impl SinkProvider for RecordingProvider {
    fn acquire(&self) -> Result<Box<dyn PlaybackSink>> {
        self.recorder.push(Event::Acquire);
        if matches!(self.failure, Failure::Acquire) {
            anyhow::bail!("no device");
        }
        Ok(Box::new(RecordingSink {
            recorder: self.recorder.clone(),
            failure: self.failure,
        }))
    }
}

fn engine_with(failure: Failure) -> (AudioEngine, Recorder) {
    let recorder = Recorder::default();
    let provider = RecordingProvider {
        recorder: recorder.clone(),
        failure,
    };
    (AudioEngine::new(provider), recorder)
}

#[test]
fn start_acquires_and_plays_once() -> Result<()> {
    let (engine, recorder) = engine_with(Failure::None);
    assert_eq!(engine.state(), EngineState::Stopped);

    engine.start()?;
    engine.start()?;

    assert!(engine.is_running());
    assert_eq!(
        recorder.events(),
        vec![Event::Acquire, Event::Init, Event::Play]
    );
    Ok(())
}

#[test]
fn stop_releases_sink_once() -> Result<()> {
    let (engine, recorder) = engine_with(Failure::None);

    engine.stop();
    assert!(recorder.events().is_empty());

    engine.start()?;
    engine.stop();
    engine.stop();

    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(recorder.count(Event::Stop), 1);
    assert_eq!(recorder.count(Event::Release), 1);
    Ok(())
}

#[test]
fn restart_acquires_a_fresh_sink() -> Result<()> {
    let (engine, recorder) = engine_with(Failure::None);

    engine.start()?;
    engine.stop();
    engine.start()?;

    assert!(engine.is_running());
    assert_eq!(recorder.count(Event::Acquire), 2);
    assert_eq!(recorder.count(Event::Release), 1);
    Ok(())
}

#[test]
fn failed_acquire_leaves_engine_stopped() {
    let (engine, recorder) = engine_with(Failure::Acquire);

    let err = engine.start().unwrap_err();
    assert!(matches!(err, EngineError::SinkUnavailable { .. }));
    assert!(err.to_string().contains("no device"));
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(recorder.events(), vec![Event::Acquire]);
}

#[test]
fn failed_init_releases_sink() {
    let (engine, recorder) = engine_with(Failure::Init);

    let err = engine.start().unwrap_err();
    assert!(matches!(err, EngineError::SinkUnavailable { .. }));
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(recorder.count(Event::Play), 0);
    assert_eq!(recorder.count(Event::Release), 1);
}

#[test]
fn failed_play_releases_sink() {
    let (engine, recorder) = engine_with(Failure::Play);

    assert!(engine.start().is_err());
    assert!(!engine.is_running());
    assert_eq!(recorder.count(Event::Release), 1);
}

#[test]
fn fed_samples_reach_the_sink_only_while_running() -> Result<()> {
    let (engine, recorder) = engine_with(Failure::None);
    let block = [0.25f32; 64];

    engine.feed_samples(&block);
    assert!(recorder.buffer().is_none());

    engine.start()?;
    let buffer = recorder.buffer().expect("sink was initialised");
    engine.feed_samples(&block);
    assert_eq!(buffer.len(), block.len());

    let expected = engine.process(&block);
    let mut queued = vec![0.0f32; block.len()];
    assert_eq!(buffer.drain_into(&mut queued), block.len());
    assert_eq!(queued, expected);

    engine.stop();
    engine.feed_samples(&block);
    assert!(buffer.is_empty());
    assert_eq!(engine.dropped_samples(), 0);
    Ok(())
}

#[test]
fn level_subscribers_receive_reports_while_running() -> Result<()> {
    let (engine, _recorder) = engine_with(Failure::None);
    let levels = engine.subscribe_levels();

    engine.start()?;
    engine.process(&[0.5f32; 256]);

    let sample = levels.recv_timeout(LEVEL_REPORT_INTERVAL * 10)?;
    assert!(sample.input_db > -120.0);
    assert!(sample.output_db > -120.0);

    engine.stop();
    while levels.try_recv().is_ok() {}
    assert!(
        levels
            .recv_timeout(LEVEL_REPORT_INTERVAL * 3)
            .is_err(),
        "no reports after stop"
    );
    Ok(())
}

#[test]
fn reference_signal_through_default_chain() {
    let (engine, _recorder) = engine_with(Failure::None);
    engine.configure(EngineConfiguration {
        tone: 10.0,
        ..Default::default()
    });

    let output = engine.process(&[0.5]);
    assert_eq!(output.len(), 1);
    assert!((output[0] - 0.477_02).abs() < 1e-4, "got {}", output[0]);
}

#[test]
fn empty_input_produces_empty_output() {
    let (engine, _recorder) = engine_with(Failure::None);
    assert!(engine.process(&[]).is_empty());
    assert_eq!(engine.levels().input_db, -120.0);
}

#[test]
fn bypass_skips_amp_and_cabinet() {
    let (engine, _recorder) = engine_with(Failure::None);
    engine.set_model(Arc::new(TransferCurveModel::new("flat", 48_000, vec![0.0])));
    engine.set_impulse_response(Arc::new(ImpulseResponse::new("loud", vec![4.0])));
    engine.set_bypassed(true);

    let input = [0.1f32, -0.3, 0.7];
    assert_eq!(engine.process(&input), input.to_vec());
}

#[test]
fn dry_mix_returns_input() {
    let (engine, _recorder) = engine_with(Failure::None);
    engine.configure(EngineConfiguration::default().with_wet_dry_mix(0.0));

    let input = [0.2f32, -0.4, 0.9];
    let output = engine.process(&input);
    for (out, inp) in output.iter().zip(input) {
        assert!((out - inp).abs() < 1e-6);
    }
}

#[test]
fn mix_outside_range_is_clamped() {
    let (engine, _recorder) = engine_with(Failure::None);

    engine.configure(EngineConfiguration::default().with_wet_dry_mix(-3.0));
    assert_eq!(engine.configuration().wet_dry_mix, 0.0);

    engine.configure(EngineConfiguration::default().with_wet_dry_mix(7.5));
    assert_eq!(engine.configuration().wet_dry_mix, 1.0);
}

#[test]
fn swaps_during_processing_stay_in_range() {
    let engine = Arc::new(engine_with(Failure::None).0);
    let hot = EngineConfiguration {
        input_gain_db: 24.0,
        output_gain_db: 12.0,
        ..Default::default()
    };
    let gated = EngineConfiguration {
        noise_gate_enabled: true,
        noise_gate_threshold_db: -10.0,
        drive: 10.0,
        output_gain_db: 40.0,
        ..Default::default()
    };
    engine.configure(hot);
    engine.set_model(Arc::new(TransferCurveModel::new("start", 48_000, vec![])));

    let done = Arc::new(AtomicBool::new(false));
    let swapper = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut flip = false;
            while !done.load(Ordering::Relaxed) {
                let curve = if flip {
                    vec![-1.0, 1.0]
                } else {
                    vec![1.0, 0.0, -1.0]
                };
                engine.set_model(Arc::new(TransferCurveModel::new("swap", 48_000, curve)));
                engine.configure(if flip { hot } else { gated });
                if flip {
                    engine.set_impulse_response(Arc::new(ImpulseResponse::new(
                        "cab",
                        vec![0.6, 0.3, 0.1],
                    )));
                } else {
                    engine.clear_impulse_response();
                }
                flip = !flip;
                thread::yield_now();
            }
        })
    };

    let input: Vec<f32> = (0..128).map(|i| (i as f32 / 64.0) - 1.0).collect();
    let mut output = vec![0.0f32; input.len()];
    for _ in 0..500 {
        engine.process_into(&input, &mut output);
        assert!(output.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    done.store(true, Ordering::Relaxed);
    swapper.join().unwrap();
    assert!(engine.model().is_some());
    assert!(engine.configuration().limiter_enabled);
}

#[test]
fn dropping_a_running_engine_releases_sink() -> Result<()> {
    let (engine, recorder) = engine_with(Failure::None);
    engine.start()?;
    drop(engine);

    assert_eq!(recorder.count(Event::Release), 1);
    Ok(())
}
