//! Periodic scheduler (§4.2 "timer"): re-schedules a frame on a fixed period regardless of
//! pending events, to drive reactors that need to tick (e.g. polling, heartbeats).

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::frame::Frame;
use crate::scheduler::Scheduler;

/// Wraps an inner scheduler: every `schedule` call is forwarded immediately, and in addition the
/// first `schedule` for a given frame starts a background thread that keeps claiming the frame's
/// own scheduling right — via `Frame::schedule_for_execution`, never a raw `inner.schedule` — every
/// `period` until the frame terminates.
pub struct TimerScheduler {
    inner: Arc<dyn Scheduler>,
    period: Duration,
    ticking: Mutex<HashSet<u64>>,
}

impl TimerScheduler {
    pub fn new(inner: Arc<dyn Scheduler>, period: Duration) -> Self {
        TimerScheduler {
            inner,
            period,
            ticking: Mutex::new(HashSet::new()),
        }
    }

    fn start_ticking(&self, frame: Arc<Frame>) {
        let uid = frame.uid();
        let mut ticking = self.ticking.lock();
        if !ticking.insert(uid) {
            return;
        }
        drop(ticking);

        let period = self.period;
        thread::Builder::new()
            .name(format!("reactor-timer-{uid}"))
            .spawn(move || loop {
                thread::sleep(period);
                if frame.has_terminated() {
                    break;
                }
                // Route through the frame's own scheduling claim rather than calling the inner
                // scheduler directly: `schedule_for_execution` is a no-op while a batch triggered
                // by a real event is already in flight, which is what keeps a tick from ever
                // running concurrently with that batch (§8 invariants 1 and 3).
                frame.schedule_for_execution();
            })
            .expect("failed to spawn timer thread");
    }
}

impl Scheduler for TimerScheduler {
    fn schedule(&self, frame: Arc<Frame>) {
        self.start_ticking(frame.clone());
        self.inner.schedule(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::piggyback::PiggybackScheduler;

    #[test]
    fn wraps_an_inner_scheduler() {
        let inner: Arc<dyn Scheduler> = Arc::new(PiggybackScheduler::inline_only());
        let timer = TimerScheduler::new(inner, Duration::from_secs(3600));
        assert!(timer.ticking.lock().is_empty());
    }
}
