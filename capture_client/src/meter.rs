//! Throughput of the capture loop.
//!
//! A session counts its cycles on its own [`Meter`]. The logger task shares
//! it and drains the counters every couple of seconds.
//!
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

const LOG_INTERVAL: Duration = Duration::from_secs(2);

/// Counters of completed and skipped capture cycles.
#[derive(Debug, Default)]
pub struct Meter {
    predicted: AtomicU64,
    skipped: AtomicU64,
}

impl Meter {
    /// A cycle rendered a prediction.
    pub fn tick_predicted(&self) {
        self.predicted.fetch_add(1, Ordering::Relaxed);
    }

    /// A cycle was dropped because inference failed.
    pub fn tick_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset the counters.
    pub fn take(&self) -> Reading {
        Reading {
            predicted: self.predicted.swap(0, Ordering::Relaxed),
            skipped: self.skipped.swap(0, Ordering::Relaxed),
        }
    }
}

/// Cycles counted since the previous [`Meter::take`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Reading {
    pub predicted: u64,
    pub skipped: u64,
}

impl Reading {
    pub fn cycles(&self) -> u64 {
        self.predicted + self.skipped
    }

    pub fn predictions_per_second(&self, elapsed: Duration) -> f32 {
        match elapsed.as_secs_f32() {
            secs if secs > 0.0 => self.predicted as f32 / secs,
            _ => 0.0,
        }
    }

    /// Share of cycles lost to failed predictions, `None` without cycles.
    pub fn skipped_ratio(&self) -> Option<f32> {
        match self.cycles() {
            0 => None,
            cycles => Some(self.skipped as f32 / cycles as f32),
        }
    }
}

/// Log the throughput of `meter` while cycles are running.
pub fn spawn_meter_logger(meter: Arc<Meter>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut log_interval = interval(LOG_INTERVAL);
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let reading = meter.take();
            if reading.predicted > 0 {
                log::info!(
                    "Predictions per second: {:.2}",
                    reading.predictions_per_second(start.elapsed())
                );
            }
            if reading.skipped > 0 {
                let ratio = reading.skipped_ratio().unwrap_or_default();
                log::warn!(
                    "Skipped {} of {} cycles ({:.0}%) after failed predictions",
                    reading.skipped,
                    reading.cycles(),
                    ratio * 100.0
                );
            }
        }
    })
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_take_resets_counters() {
        let meter = Meter::default();

        meter.tick_predicted();
        meter.tick_predicted();
        meter.tick_skipped();

        assert_eq!(
            meter.take(),
            Reading {
                predicted: 2,
                skipped: 1
            }
        );
        assert_eq!(meter.take(), Reading::default());
    }

    #[test]
    fn test_skipped_ratio() {
        let reading = Reading {
            predicted: 3,
            skipped: 1,
        };

        assert_eq!(reading.cycles(), 4);
        assert_eq!(reading.skipped_ratio(), Some(0.25));
        assert_eq!(Reading::default().skipped_ratio(), None);
    }

    #[test]
    fn test_predictions_per_second() {
        let reading = Reading {
            predicted: 30,
            skipped: 0,
        };

        assert_eq!(reading.predictions_per_second(Duration::from_secs(2)), 15.0);
        assert_eq!(reading.predictions_per_second(Duration::ZERO), 0.0);
    }
}
