//! Synchronous streaming driver.
//!
//! This module contains the building blocks that turn the two DMA page
//! pairs of a MOST PCI card into per-client byte streams:
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`endpoint`] - Per-direction stream state machine
//! - [`role`] - Receive and transmit specifics of an endpoint
//! - [`interrupt`] - Page-flip interrupt status parsing
//! - [`card`] - Card, client handle and interrupter
//! - [`manager`] - Registry of probed cards
//!
//! # Example
//!
//! ```ignore
//! use ph_most_sync::driver::{FramePart, StreamDirection, SyncConfig, SyncDriver};
//!
//! let mut driver = SyncDriver::new(SyncConfig::new())?;
//! let card = driver.probe(regs, dma, dispatch, delay)?;
//!
//! let client = card.open()?;
//! client.configure(StreamDirection::Transmit, FramePart::new(4, 0))?;
//! client.write(&samples)?;
//! ```

// Submodules
pub mod card;
pub mod config;
pub mod endpoint;
pub mod interrupt;
pub mod manager;
pub mod role;

#[cfg(test)]
mod scenarios;

// Re-exports for convenience
pub use card::{ClientHandle, Interrupter, SyncCard};
pub use config::{FramePart, StreamDirection, StreamState, SyncConfig};
pub use endpoint::{ClientId, StreamEndpoint, StreamStats};
pub use interrupt::InterruptStatus;
pub use manager::{SharedDispatch, SyncDriver};
pub use role::{Rx, StreamRole, Tx};
