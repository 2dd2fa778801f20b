//! Display refresh driven frame scheduling.
//!
use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

/// Ticket of a requested frame, used to cancel it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FrameHandle(u64);

/// Hands out at most one frame per display refresh.
///
/// There is at most one outstanding request. A slow consumer simply misses
/// refreshes, ticks are delayed rather than bursted.
///
/// The refresh clock starts with the first [`FrameScheduler::next_frame`], so
/// a scheduler can be built outside of a runtime.
pub struct FrameScheduler {
    period: Duration,
    ticker: Option<Interval>,
    pending: Option<FrameHandle>,
    next_id: u64,
}

impl FrameScheduler {
    pub fn new(refresh_rate: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(refresh_rate.max(1))),
            ticker: None,
            pending: None,
            next_id: 0,
        }
    }

    /// Request a frame on the next refresh, replacing any outstanding request.
    pub fn request(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending = Some(handle);

        handle
    }

    /// Cancel a request. Returns `false` if it was not outstanding anymore.
    pub fn cancel(&mut self, handle: FrameHandle) -> bool {
        match self.pending {
            Some(pending) if pending == handle => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Wait for the next refresh and hand out the outstanding request.
    ///
    /// Cancel safe: dropping the future keeps the request outstanding.
    pub async fn next_frame(&mut self) -> Option<FrameHandle> {
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
        self.pending.take()
    }
}
