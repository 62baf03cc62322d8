//! One dedicated OS thread per frame (§4.2 "new-thread"), for reactors that are known to block
//! (e.g. blocking I/O) and must not tie up a shared pool worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::frame::Frame;
use crate::scheduler::Scheduler;

struct Worker {
    state: Mutex<bool>,
    wakeup: Condvar,
}

impl Worker {
    fn notify(&self) {
        let mut runnable = self.state.lock();
        *runnable = true;
        self.wakeup.notify_one();
    }
}

/// `schedule` starts (on first use) or signals (thereafter) one thread per frame; that thread
/// loops on nothing but this frame until it terminates.
pub struct NewThreadScheduler {
    workers: Arc<Mutex<HashMap<u64, Arc<Worker>>>>,
}

impl NewThreadScheduler {
    pub fn new() -> Self {
        NewThreadScheduler {
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn workers_handle(&self) -> Arc<Mutex<HashMap<u64, Arc<Worker>>>> {
        self.workers.clone()
    }
}

impl Default for NewThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for NewThreadScheduler {
    fn schedule(&self, frame: Arc<Frame>) {
        let uid = frame.uid();
        let worker = {
            let mut workers = self.workers.lock();
            workers
                .entry(uid)
                .or_insert_with(|| {
                    let worker = Arc::new(Worker {
                        state: Mutex::new(false),
                        wakeup: Condvar::new(),
                    });
                    let worker_for_thread = worker.clone();
                    let frame_for_thread = frame.clone();
                    let workers_handle = self.workers_handle();
                    thread::Builder::new()
                        .name(format!("reactor-{uid}"))
                        .spawn(move || loop {
                            {
                                let mut runnable = worker_for_thread.state.lock();
                                while !*runnable {
                                    worker_for_thread.wakeup.wait(&mut runnable);
                                }
                                *runnable = false;
                            }
                            frame_for_thread.execute_batch();
                            if frame_for_thread.has_terminated() {
                                // Remove our own entry rather than waiting for a `schedule` call
                                // that may never come once the frame is done: otherwise the map
                                // entry (and this thread's `Arc<Worker>`) leaks for the
                                // scheduler's lifetime.
                                workers_handle.lock().remove(&uid);
                                break;
                            }
                        })
                        .expect("failed to spawn per-frame reactor thread");
                    worker
                })
                .clone()
        };
        worker.notify();
    }
}
