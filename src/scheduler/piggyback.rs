//! Current-thread scheduler (§4.2 "piggyback"): runs the batch inline on the caller's thread,
//! provided the caller is not already inside a reactor.

use std::sync::Arc;

use crate::context;
use crate::frame::Frame;
use crate::scheduler::Scheduler;

/// Runs `schedule` on the calling thread when legal; otherwise falls back to `fallback` (an
/// asynchronous policy), since running inline from inside a reactor would violate the
/// no-nested-execution invariant (§4.4).
pub struct PiggybackScheduler {
    fallback: Arc<dyn Scheduler>,
}

impl PiggybackScheduler {
    pub fn new(fallback: Arc<dyn Scheduler>) -> Self {
        PiggybackScheduler { fallback }
    }

    /// A piggyback scheduler with no async fallback, for contexts that are known to never
    /// schedule from inside a reactor (tests, single-reactor examples).
    pub fn inline_only() -> Self {
        PiggybackScheduler {
            fallback: Arc::new(NoFallback),
        }
    }
}

impl Scheduler for PiggybackScheduler {
    fn schedule(&self, frame: Arc<Frame>) {
        if context::current_frame().is_some() {
            self.fallback.schedule(frame);
        } else {
            frame.execute_batch();
        }
    }
}

/// Fails deterministically (rather than silently dropping the schedule request) when a piggyback
/// scheduler with no configured fallback is asked to schedule from inside a reactor.
struct NoFallback;

impl Scheduler for NoFallback {
    fn schedule(&self, frame: Arc<Frame>) {
        panic!(
            "piggyback scheduler has no fallback and cannot run frame {} from inside a reactor",
            frame.uid()
        );
    }
}
