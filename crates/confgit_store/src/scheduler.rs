//! Background synchronization scheduler.
//!
//! One worker thread runs the timed cycle: an initial pull on the very
//! first cycle, then optionally a pull (when pull-before-push is on) and
//! always a push, at a fixed delay. A commit whose push failed gets
//! published by a later cycle this way.
//!
//! When pull-before-push is off, change detection comes from the
//! distributed counter instead: every observed value change triggers a
//! pull after a short randomized delay, so near-simultaneous
//! notifications across peers spread out. Only one of the two mechanisms
//! runs at a time.
//!
//! Every cycle failure is caught and logged; a sync failure never kills
//! the schedule. Shutdown waits a bounded grace period for an in-flight
//! cycle, then detaches the worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rand::Rng;
use tracing::{info, trace, warn};

use crate::counter::SharedCounter;
use crate::registry::ProfileStore;

struct Shared {
    store: Arc<ProfileStore>,
    stop: Mutex<bool>,
    tick: Condvar,
    done: Mutex<bool>,
    done_signal: Condvar,
}

/// Drives periodic and counter-triggered synchronization for one store.
pub struct SyncScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    grace: Duration,
}

impl SyncScheduler {
    /// Starts the scheduler. When the store is not in pull-before-push
    /// mode and a counter is given, subscribes to it for remote-change
    /// wakeups.
    pub fn start(store: Arc<ProfileStore>, counter: Option<Arc<dyn SharedCounter>>) -> Self {
        let config = store.config().clone();

        if config.pull_on_push {
            if counter.is_some() {
                info!("pull-before-push enabled; ignoring the shared counter");
            }
        } else if let Some(counter) = counter {
            info!("using the shared counter to react to remote changes");
            let trigger = Arc::clone(&store);
            let delay_bound = config.counter_delay;
            counter.subscribe(Arc::new(move |value| {
                // Spread out near-simultaneous notifications across peers.
                let bound = delay_bound.as_millis() as u64;
                if bound > 0 {
                    let delay = rand::thread_rng().gen_range(0..=bound);
                    thread::sleep(Duration::from_millis(delay));
                }
                info!("counter changed to {value}, doing a pull");
                let _write = trigger.lock().acquire_write();
                trigger.pull_locked();
            }));
        }

        let shared = Arc::new(Shared {
            store,
            stop: Mutex::new(false),
            tick: Condvar::new(),
            done: Mutex::new(false),
            done_signal: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("confgit-sync".to_string())
            .spawn(move || {
                let mut wait = config.initial_sync_delay;
                let mut initial_pull_done = false;
                loop {
                    {
                        let mut stop = worker_shared.stop.lock();
                        if !*stop {
                            let _ = worker_shared.tick.wait_for(&mut stop, wait);
                        }
                        if *stop {
                            break;
                        }
                    }
                    Self::run_cycle(
                        &worker_shared.store,
                        &mut initial_pull_done,
                        config.pull_on_push,
                    );
                    wait = config.push_interval;
                }
                *worker_shared.done.lock() = true;
                worker_shared.done_signal.notify_all();
            })
            .expect("failed to spawn the sync scheduler thread");

        Self {
            shared,
            worker: Some(worker),
            grace: config.shutdown_grace,
        }
    }

    fn run_cycle(store: &ProfileStore, initial_pull_done: &mut bool, pull_on_push: bool) {
        let _write = store.lock().acquire_write();
        if !*initial_pull_done {
            trace!("performing initial pull");
            store.pull_locked();
            *initial_pull_done = true;
            info!("initial pull completed");
        }
        if pull_on_push {
            trace!("performing timed pull");
            store.pull_locked();
        }
        trace!("performing timed push");
        store.push_locked();
    }

    /// Stops the scheduler: signals the worker, waits the grace period
    /// for an in-flight cycle, then detaches when it does not finish.
    pub fn stop(&mut self) {
        {
            let mut stop = self.shared.stop.lock();
            *stop = true;
        }
        self.shared.tick.notify_all();

        let finished = {
            let mut done = self.shared.done.lock();
            if !*done {
                let _ = self.shared.done_signal.wait_for(&mut done, self.grace);
            }
            *done
        };

        if let Some(worker) = self.worker.take() {
            if finished {
                let _ = worker.join();
            } else {
                warn!(
                    "scheduler did not finish within {:?}; detaching the worker",
                    self.grace
                );
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}
