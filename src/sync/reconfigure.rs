//! Quiesce barrier between stream reconfiguration and client I/O.
//!
//! A write-preferring readers/writer lock: any number of reads or writes
//! may be in flight together, while a reconfiguration first raises
//! `reconfiguring` (blocking new I/O) and then waits for the in-flight
//! count to drain to zero. The page-flip handler never touches this lock.

use super::primitives::CriticalSectionCell;
use super::suspend::{CancelFlag, Suspend};
use crate::error::{ConfigError, ConfigResult, IoResult};

#[derive(Debug, Default)]
struct LockState {
    reconfiguring: bool,
    active_io: usize,
}

/// Reconfiguration lock for one stream direction.
#[derive(Default)]
pub struct ReconfigureLock<S: Suspend> {
    state: CriticalSectionCell<LockState>,
    waiters: S,
}

impl<S: Suspend> ReconfigureLock<S> {
    /// Create an idle lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an I/O critical section.
    ///
    /// Blocks while a reconfiguration is running.
    pub fn enter_io(&self, cancel: Option<&CancelFlag>) -> IoResult<IoGuard<'_, S>> {
        self.waiters.wait_until(cancel, || {
            self.state.with(|state| {
                if state.reconfiguring {
                    None
                } else {
                    state.active_io += 1;
                    Some(())
                }
            })
        })?;
        Ok(IoGuard { lock: self })
    }

    /// Start a reconfiguration, failing with [`ConfigError::Busy`] if
    /// another one is already running.
    pub fn try_begin(&self) -> ConfigResult<ReconfigureGuard<'_, S>> {
        let claimed = self.state.with(|state| {
            if state.reconfiguring {
                false
            } else {
                state.reconfiguring = true;
                true
            }
        });
        if !claimed {
            return Err(ConfigError::Busy);
        }
        Ok(self.drain())
    }

    /// Start a reconfiguration, waiting for a running one to finish first.
    pub fn begin(&self) -> ReconfigureGuard<'_, S> {
        let claimed = self.waiters.wait_until(None, || {
            self.state.with(|state| {
                if state.reconfiguring {
                    None
                } else {
                    state.reconfiguring = true;
                    Some(())
                }
            })
        });
        debug_assert!(claimed.is_ok());
        self.drain()
    }

    /// Number of reads/writes currently inside their critical section.
    pub fn in_flight(&self) -> usize {
        self.state.with_ref(|state| state.active_io)
    }

    /// Whether a reconfiguration holds the lock.
    pub fn is_reconfiguring(&self) -> bool {
        self.state.with_ref(|state| state.reconfiguring)
    }

    /// Wake every waiter (used when cancellation is requested).
    pub fn wake_all(&self) {
        self.waiters.notify_all();
    }

    fn drain(&self) -> ReconfigureGuard<'_, S> {
        let guard = ReconfigureGuard { lock: self };
        // Uncancellable wait: in-flight I/O never sleeps while counted.
        let _ = self.waiters.wait_until(None, || {
            self.state
                .with_ref(|state| (state.active_io == 0).then_some(()))
        });
        guard
    }
}

/// Proof that the holder is inside an I/O critical section.
pub struct IoGuard<'a, S: Suspend> {
    lock: &'a ReconfigureLock<S>,
}

impl<S: Suspend> Drop for IoGuard<'_, S> {
    fn drop(&mut self) {
        let drained = self.lock.state.with(|state| {
            state.active_io -= 1;
            state.active_io == 0
        });
        if drained {
            self.lock.waiters.notify_all();
        }
    }
}

/// Proof that the holder has exclusive access for reconfiguration.
///
/// While alive, no read or write is in flight and none can start.
pub struct ReconfigureGuard<'a, S: Suspend> {
    lock: &'a ReconfigureLock<S>,
}

impl<S: Suspend> ReconfigureGuard<'_, S> {
    /// In-flight I/O count; always zero while the guard is held.
    pub fn in_flight(&self) -> usize {
        self.lock.in_flight()
    }
}

impl<S: Suspend> Drop for ReconfigureGuard<'_, S> {
    fn drop(&mut self) {
        self.lock.state.with(|state| state.reconfiguring = false);
        self.lock.waiters.notify_all();
    }
}
