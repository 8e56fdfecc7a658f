//! Interrupt status handling for the synchronous page-flip sources.
//!
//! This module provides the [`InterruptStatus`] structure for parsing the
//! bridge interrupt bits the dispatch collaborator hands to the card.

use crate::internal::register::{IRQ_SYNC_RX, IRQ_SYNC_TX};

// =============================================================================
// Interrupt Status
// =============================================================================

/// Synchronous interrupt flags parsed from a raw source mask.
///
/// Bits belonging to other bridge sources are ignored.
///
/// # Example
///
/// ```ignore
/// let status = InterruptStatus::from_raw(bits);
/// if status.sync_rx {
///     // Receive page flipped
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus {
    /// Receive page flipped, the previous page is complete
    pub sync_rx: bool,
    /// Transmit page flipped, the previous page needs refilling
    pub sync_tx: bool,
}

impl InterruptStatus {
    /// Create from a raw interrupt source mask
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            sync_rx: (status & IRQ_SYNC_RX) != 0,
            sync_tx: (status & IRQ_SYNC_TX) != 0,
        }
    }

    /// Convert to raw value for clearing (write-1-to-clear)
    #[inline]
    pub fn to_raw(&self) -> u32 {
        let mut val = 0u32;
        if self.sync_rx {
            val |= IRQ_SYNC_RX;
        }
        if self.sync_tx {
            val |= IRQ_SYNC_TX;
        }
        val
    }

    /// Check if any synchronous source fired
    #[inline]
    pub fn any(&self) -> bool {
        self.sync_rx || self.sync_tx
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
