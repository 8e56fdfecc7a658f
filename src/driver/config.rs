//! Configuration types for the synchronous streaming core

use crate::error::{ConfigError, ConfigResult};
use crate::internal::constants::{
    DEFAULT_HW_RX_FRAMES, DEFAULT_HW_TX_FRAMES, DEFAULT_MAX_CLIENTS, DEFAULT_SW_RX_DEPTH,
    DEFAULT_SW_TX_DEPTH, RESET_TIMEOUT_MS,
};

pub use crate::ring::FramePart;

/// Direction of a synchronous stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamDirection {
    /// Network to host
    Receive,
    /// Host to network
    Transmit,
}

impl StreamDirection {
    /// Both directions, receive first
    pub const ALL: [StreamDirection; 2] = [StreamDirection::Receive, StreamDirection::Transmit];
}

/// Per-direction stream state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    /// No DMA buffer, no running client
    #[default]
    Idle,
    /// Reconfiguration in progress
    Configuring,
    /// DMA active, interrupt enabled, at least one client
    Running,
}

/// Card-wide streaming configuration, fixed when the card is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncConfig {
    /// Receive frame-groups buffered in software
    pub sw_rx_depth: usize,
    /// Transmit frame-groups buffered in software
    pub sw_tx_depth: usize,
    /// Receive frame-groups per DMA page
    pub hw_rx_frames: usize,
    /// Transmit frame-groups per DMA page
    pub hw_tx_frames: usize,
    /// Open client handles allowed per card
    pub max_clients: usize,
    /// Chip reset timeout in milliseconds
    pub reset_timeout_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncConfig {
    /// Create a configuration with the default depths (one second of
    /// software buffering, one millisecond per DMA page).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sw_rx_depth: DEFAULT_SW_RX_DEPTH,
            sw_tx_depth: DEFAULT_SW_TX_DEPTH,
            hw_rx_frames: DEFAULT_HW_RX_FRAMES,
            hw_tx_frames: DEFAULT_HW_TX_FRAMES,
            max_clients: DEFAULT_MAX_CLIENTS,
            reset_timeout_ms: RESET_TIMEOUT_MS,
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the receive software depth in frame-groups
    #[must_use]
    pub const fn with_sw_rx_depth(mut self, frames: usize) -> Self {
        self.sw_rx_depth = frames;
        self
    }

    /// Set the transmit software depth in frame-groups
    #[must_use]
    pub const fn with_sw_tx_depth(mut self, frames: usize) -> Self {
        self.sw_tx_depth = frames;
        self
    }

    /// Set the receive frame-groups per DMA page
    #[must_use]
    pub const fn with_hw_rx_frames(mut self, frames: usize) -> Self {
        self.hw_rx_frames = frames;
        self
    }

    /// Set the transmit frame-groups per DMA page
    #[must_use]
    pub const fn with_hw_tx_frames(mut self, frames: usize) -> Self {
        self.hw_tx_frames = frames;
        self
    }

    /// Set the client limit per card
    #[must_use]
    pub const fn with_max_clients(mut self, clients: usize) -> Self {
        self.max_clients = clients;
        self
    }

    /// Set the chip reset timeout
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.reset_timeout_ms = timeout_ms;
        self
    }

    /// Software depth for `direction`
    #[must_use]
    pub const fn sw_depth(&self, direction: StreamDirection) -> usize {
        match direction {
            StreamDirection::Receive => self.sw_rx_depth,
            StreamDirection::Transmit => self.sw_tx_depth,
        }
    }

    /// Frame-groups per DMA page for `direction`
    #[must_use]
    pub const fn hw_frames(&self, direction: StreamDirection) -> usize {
        match direction {
            StreamDirection::Receive => self.hw_rx_frames,
            StreamDirection::Transmit => self.hw_tx_frames,
        }
    }

    /// Reject zero depths, zero page sizes and a zero client limit.
    ///
    /// The page register holds 16 bits, so larger page sizes are refused.
    pub fn validate(&self) -> ConfigResult<()> {
        let depths_ok = self.sw_rx_depth > 0 && self.sw_tx_depth > 0;
        let pages_ok = (1..=usize::from(u16::MAX)).contains(&self.hw_rx_frames)
            && (1..=usize::from(u16::MAX)).contains(&self.hw_tx_frames);
        if depths_ok && pages_ok && self.max_clients > 0 && self.reset_timeout_ms > 0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidConfig)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
