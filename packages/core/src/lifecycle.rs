//! Workspace teardown handshake.
//!
//! A workspace admits operations while `Active`. Retirement first stops
//! admission (`Retiring`), then settles into `Retired` as soon as the last
//! in-flight operation exits. Whoever causes that last step runs the
//! settle callback exactly once, outside every lock.

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    /// No new operations are admitted; in-flight ones are finishing.
    Retiring,
    Retired,
}

struct Counter {
    state: LifecycleState,
    in_flight: usize,
    settling: bool,
}

type OnRetired = Box<dyn FnOnce() + Send>;

/// Tracks whether a workspace accepts operations and how many are running.
pub struct Lifecycle {
    counter: Mutex<Counter>,
    changed: Condvar,
    on_retired: Mutex<Option<OnRetired>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            counter: Mutex::new(Counter {
                state: LifecycleState::Active,
                in_flight: 0,
                settling: false,
            }),
            changed: Condvar::new(),
            on_retired: Mutex::new(None),
        }
    }

    /// Run `callback` when retirement settles, before the state reads
    /// `Retired`. Replaces any earlier callback.
    pub fn on_retired(&self, callback: impl FnOnce() + Send + 'static) {
        *self.on_retired.lock() = Some(Box::new(callback));
    }

    pub fn state(&self) -> LifecycleState {
        self.counter.lock().state
    }

    pub fn in_flight(&self) -> usize {
        self.counter.lock().in_flight
    }

    /// Admit one operation. Fails with [`Error::Retired`] unless active.
    pub fn enter(&self) -> Result<OpGuard<'_>> {
        let mut counter = self.counter.lock();
        if counter.state != LifecycleState::Active {
            return Err(Error::Retired);
        }
        counter.in_flight += 1;
        Ok(OpGuard { lifecycle: self })
    }

    /// Stop admitting operations. Returns `true` if this call made the
    /// transition. Never blocks; settles immediately when idle.
    pub fn begin_retire(&self) -> bool {
        let mut counter = self.counter.lock();
        if counter.state != LifecycleState::Active {
            return false;
        }
        counter.state = LifecycleState::Retiring;
        let settle = claim_settle(&mut counter);
        drop(counter);
        if settle {
            self.settle();
        }
        true
    }

    /// Block until retirement has settled.
    ///
    /// Must not be called while holding an [`OpGuard`] from this lifecycle,
    /// or before retirement has begun.
    pub fn wait_retired(&self) {
        let mut counter = self.counter.lock();
        while counter.state != LifecycleState::Retired {
            self.changed.wait(&mut counter);
        }
    }

    fn settle(&self) {
        let callback = self.on_retired.lock().take();
        if let Some(callback) = callback {
            callback();
        }
        self.counter.lock().state = LifecycleState::Retired;
        self.changed.notify_all();
    }

    fn exit(&self) {
        let mut counter = self.counter.lock();
        counter.in_flight -= 1;
        let settle = claim_settle(&mut counter);
        drop(counter);
        if settle {
            self.settle();
        }
    }
}

/// Retiring, idle and not yet claimed by another thread.
fn claim_settle(counter: &mut Counter) -> bool {
    if counter.state == LifecycleState::Retiring && counter.in_flight == 0 && !counter.settling {
        counter.settling = true;
        true
    } else {
        false
    }
}

/// One admitted operation. Dropping the last one lets a pending retirement
/// settle.
pub struct OpGuard<'a> {
    lifecycle: &'a Lifecycle,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.exit();
    }
}
