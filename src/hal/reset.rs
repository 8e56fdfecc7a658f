//! Transceiver Reset HAL
//!
//! Pulses the chip reset through [`RegisterAccess`] and polls the chip
//! status register until the transceiver reports ready.

use embedded_hal::delay::DelayNs;

use super::registers::RegisterAccess;
use crate::error::{ConfigError, ConfigResult};
use crate::internal::constants::{RESET_POLL_INTERVAL_US, RESET_TIMEOUT_MS};
use crate::internal::register::chip::{CHIP_STATUS, CHIP_STATUS_READY};

// =============================================================================
// Reset Controller
// =============================================================================

/// Reset controller for the transceiver chip
#[derive(Debug)]
pub struct ResetController<'a, R: RegisterAccess + ?Sized, D: DelayNs> {
    regs: &'a R,
    delay: D,
    timeout_ms: u32,
}

impl<'a, R: RegisterAccess + ?Sized, D: DelayNs> ResetController<'a, R, D> {
    /// Create a new reset controller with the default timeout
    pub fn new(regs: &'a R, delay: D) -> Self {
        Self::with_timeout(regs, delay, RESET_TIMEOUT_MS)
    }

    /// Create a new reset controller with custom timeout
    pub fn with_timeout(regs: &'a R, delay: D, timeout_ms: u32) -> Self {
        Self {
            regs,
            delay,
            timeout_ms,
        }
    }

    /// Reset the chip and wait until it reports ready.
    ///
    /// Returns [`ConfigError::ResetFailed`] if the reset pulse is rejected
    /// or the ready bit does not appear within the timeout.
    pub fn reset(&mut self) -> ConfigResult<()> {
        self.regs
            .reset_chip()
            .map_err(|_| ConfigError::ResetFailed)?;

        let max_polls = u64::from(self.timeout_ms) * 1000 / u64::from(RESET_POLL_INTERVAL_US);
        for _ in 0..max_polls {
            if self.is_ready() {
                return Ok(());
            }
            self.delay.delay_us(RESET_POLL_INTERVAL_US);
        }

        Err(ConfigError::ResetFailed)
    }

    /// Check whether the chip accepts register access. Read failures count
    /// as not ready.
    pub fn is_ready(&self) -> bool {
        self.regs
            .read_register(CHIP_STATUS)
            .is_ok_and(|status| status & CHIP_STATUS_READY != 0)
    }

    /// Get the current timeout setting
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}
