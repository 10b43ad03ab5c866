use crossbeam::channel::{Receiver, Sender, TrySendError, bounded, tick};
use crossbeam::select;
use log::{debug, error};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::audio::level_meter::{LevelCell, LevelSample};

/// Notifications buffered per subscriber before new ones are dropped.
const SUBSCRIBER_CAPACITY: usize = 16;

/// Fan-out of level notifications.
///
/// Publishing never blocks: a subscriber whose channel is full misses the
/// notification, and one whose receiver was dropped is forgotten.
#[derive(Debug, Default)]
pub struct LevelSubscribers {
    senders: Mutex<Vec<Sender<LevelSample>>>,
}

impl LevelSubscribers {
    pub fn subscribe(&self) -> Receiver<LevelSample> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, sample: LevelSample) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| !matches!(tx.try_send(sample), Err(TrySendError::Disconnected(_))));
    }

    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background thread that publishes the latest levels on a fixed period.
pub struct LevelReporter {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl LevelReporter {
    pub fn spawn(
        levels: Arc<LevelCell>,
        subscribers: Arc<LevelSubscribers>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("level-reporter".to_string())
            .spawn(move || run_reporter(&levels, &subscribers, interval, &stop_rx))?;

        debug!("Level reporter started ({interval:?} period)");
        Ok(Self { stop_tx, handle })
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(self) {
        drop(self.stop_tx);
        if self.handle.join().is_err() {
            error!("Level reporter thread panicked");
        } else {
            debug!("Level reporter stopped");
        }
    }
}

fn run_reporter(
    levels: &LevelCell,
    subscribers: &LevelSubscribers,
    interval: Duration,
    stop_rx: &Receiver<()>,
) {
    let ticker = tick(interval);

    loop {
        select! {
            recv(ticker) -> _ => subscribers.publish(levels.load()),
            recv(stop_rx) -> _ => break,
        }
    }
}
