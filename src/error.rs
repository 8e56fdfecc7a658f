//! Error types for the MOST synchronous streaming core
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Stream configuration and card bring-up failures
//! - [`DmaError`]: DMA buffer and ring buffer issues
//! - [`IoError`]: Runtime read/write failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and initialization errors
///
/// These errors occur while configuring a stream, opening a client,
/// or bringing up a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Frame part is empty or exceeds the synchronous frame bounds
    InvalidArgument,
    /// Client limit reached, or another configure is already running
    Busy,
    /// Invalid configuration parameter
    InvalidConfig,
    /// Chip reset did not complete in time
    ResetFailed,
    /// No card registered under the given id
    UnknownCard,
    /// All card slots of the driver are in use
    CardSlotsExhausted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::InvalidArgument => "frame part out of bounds",
            ConfigError::Busy => "device or stream busy",
            ConfigError::InvalidConfig => "invalid configuration",
            ConfigError::ResetFailed => "chip reset failed",
            ConfigError::UnknownCard => "unknown card",
            ConfigError::CardSlotsExhausted => "no free card slot",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// DMA buffer and ring buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// DMA region or ring storage could not be allocated
    OutOfMemory,
    /// Producer outran the slowest reader; frame-groups were dropped
    Overrun,
    /// Length is zero or not a whole number of frame-groups
    InvalidLength,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::OutOfMemory => "out of memory",
            DmaError::Overrun => "receive overrun",
            DmaError::InvalidLength => "invalid length",
        }
    }
}

/// Outcome of a receive ring `put` that could not store everything.
///
/// The accepted frame-groups are visible to readers; the dropped ones are
/// lost. Reported upward, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overrun {
    /// Bytes appended before the ring filled up
    pub accepted: usize,
    /// Bytes discarded because the slowest reader had not caught up
    pub dropped: usize,
}

impl From<Overrun> for DmaError {
    fn from(_: Overrun) -> Self {
        DmaError::Overrun
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime read/write errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Blocking call cancelled through its [`Interrupter`](crate::Interrupter)
    Interrupted,
    /// Client has no running stream in the requested direction
    NotConfigured,
    /// Register access to the bridge or transceiver failed
    RegisterAccess,
    /// Copy strategy could not move the bytes
    CopyFault,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Interrupted => "interrupted",
            IoError::NotConfigured => "stream not configured",
            IoError::RegisterAccess => "register access failed",
            IoError::CopyFault => "copy fault",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// ```ignore
/// match handle.configure(StreamDirection::Receive, part) {
///     Err(Error::Config(ConfigError::Busy)) => { /* retry later */ }
///     Err(Error::Dma(DmaError::OutOfMemory)) => { /* shrink depth */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA error
    Dma(DmaError),
    /// I/O error
    Io(IoError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Dma(e) => write!(f, "dma: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for DMA operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================
