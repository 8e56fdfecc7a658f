//! Pluggable blocking primitives.
//!
//! Client reads, writes and reconfiguration block on a [`Suspend`]
//! implementation; the page-flip handler only ever calls
//! [`Suspend::notify_all`], which never blocks for long.
//!
//! - [`CondvarSuspend`] (`std`): parks the thread on a condition variable.
//! - [`SpinSuspend`]: real-time-safe event counter, spins without taking locks.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::{IoError, IoResult};

/// One-shot cancellation request for a blocking call.
///
/// Raising the flag makes the next (or currently) blocked wait return
/// [`IoError::Interrupted`]. The wait consumes the flag.
#[derive(Debug, Default)]
pub struct CancelFlag {
    raised: AtomicBool,
}

impl CancelFlag {
    /// Create a lowered flag.
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Request cancellation.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether cancellation is pending.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Consume a pending cancellation.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}

/// Blocking strategy used by the streaming core.
pub trait Suspend: Default + Send + Sync {
    /// Block until `ready` yields a value.
    ///
    /// `ready` is re-evaluated after every [`notify_all`](Self::notify_all).
    /// With a `cancel` flag the wait returns [`IoError::Interrupted`] once
    /// the flag is raised.
    fn wait_until<T, F>(&self, cancel: Option<&CancelFlag>, ready: F) -> IoResult<T>
    where
        F: FnMut() -> Option<T>;

    /// Wake every waiter so it re-evaluates its condition.
    fn notify_all(&self);
}

// =============================================================================
// Spin Event
// =============================================================================

/// Event counter suitable for real-time contexts.
///
/// Waiters spin on a generation counter; notifiers bump it. Nothing here
/// takes a lock, so the notifier side is safe to call from interrupt
/// handlers on any target.
#[derive(Debug, Default)]
pub struct SpinSuspend {
    generation: AtomicU32,
}

impl SpinSuspend {
    /// Create a new event.
    pub const fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
        }
    }
}

impl Suspend for SpinSuspend {
    fn wait_until<T, F>(&self, cancel: Option<&CancelFlag>, mut ready: F) -> IoResult<T>
    where
        F: FnMut() -> Option<T>,
    {
        loop {
            let seen = self.generation.load(Ordering::Acquire);
            if let Some(value) = ready() {
                return Ok(value);
            }
            if cancel.is_some_and(CancelFlag::take) {
                return Err(IoError::Interrupted);
            }
            while self.generation.load(Ordering::Acquire) == seen
                && !cancel.is_some_and(CancelFlag::is_raised)
            {
                core::hint::spin_loop();
            }
        }
    }

    fn notify_all(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }
}

// =============================================================================
// Condition Variable
// =============================================================================

#[cfg(feature = "std")]
pub use self::condvar::CondvarSuspend;

#[cfg(feature = "std")]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod condvar {
    extern crate std;

    use std::sync::{Condvar, Mutex, PoisonError};

    use super::{CancelFlag, Suspend};
    use crate::error::{IoError, IoResult};

    /// Thread-parking wait queue built on `std::sync::Condvar`.
    ///
    /// The condition is evaluated with the queue mutex held, so a notify
    /// issued between the check and the park is never lost.
    #[derive(Debug, Default)]
    pub struct CondvarSuspend {
        generation: Mutex<u64>,
        cond: Condvar,
    }

    impl Suspend for CondvarSuspend {
        fn wait_until<T, F>(&self, cancel: Option<&CancelFlag>, mut ready: F) -> IoResult<T>
        where
            F: FnMut() -> Option<T>,
        {
            let mut guard = self
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            loop {
                if let Some(value) = ready() {
                    return Ok(value);
                }
                if cancel.is_some_and(CancelFlag::take) {
                    return Err(IoError::Interrupted);
                }
                guard = self
                    .cond
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        fn notify_all(&self) {
            {
                let mut generation = self
                    .generation
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                *generation = generation.wrapping_add(1);
            }
            self.cond.notify_all();
        }
    }
}

/// Blocking strategy used when none is named explicitly.
#[cfg(feature = "std")]
pub type DefaultSuspend = CondvarSuspend;

/// Blocking strategy used when none is named explicitly.
#[cfg(not(feature = "std"))]
pub type DefaultSuspend = SpinSuspend;
