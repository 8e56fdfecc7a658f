//! Card and client handles.
//!
//! A [`SyncCard`] owns the receive and transmit [`StreamEndpoint`]s of one
//! MOST PCI card. Clients talk to it through [`ClientHandle`]s; a blocked
//! call on a handle is cancelled through its [`Interrupter`].
//!
//! # Example
//!
//! ```ignore
//! let client = card.open()?;
//! client.configure(StreamDirection::Receive, FramePart::new(4, 0))?;
//!
//! let mut samples = [0u8; 1024];
//! let n = client.read(&mut samples)?;
//! ```

use alloc::sync::Arc;

use embedded_hal::delay::DelayNs;

use super::config::{FramePart, StreamDirection, StreamState, SyncConfig};
use super::endpoint::{Bus, ClientId, StreamEndpoint, StreamStats};
use super::interrupt::InterruptStatus;
use super::role::{Rx, Tx};
use crate::error::{ConfigError, ConfigResult, Result};
use crate::hal::dma::DmaAllocator;
use crate::hal::registers::RegisterAccess;
use crate::hal::reset::ResetController;
use crate::internal::log::{stream_debug, stream_info};
use crate::ring::{CopyStrategy, MemCopy};
use crate::sync::{CancelFlag, CriticalSectionCell, DefaultSuspend, Suspend};

#[derive(Debug, Default)]
struct ClientTable {
    open: usize,
    next_id: u32,
}

// =============================================================================
// Card
// =============================================================================

/// One MOST PCI card: the receive and transmit streams plus the
/// collaborators they program.
pub struct SyncCard<S: Suspend = DefaultSuspend> {
    id: usize,
    regs: Arc<dyn RegisterAccess>,
    dma: Arc<dyn DmaAllocator>,
    config: SyncConfig,
    rx: StreamEndpoint<Rx, S>,
    tx: StreamEndpoint<Tx, S>,
    clients: CriticalSectionCell<ClientTable>,
}

impl<S: Suspend> SyncCard<S> {
    /// Create a card bound to its register window and DMA allocator.
    ///
    /// The card does not reset the chip or register an interrupt handler;
    /// [`SyncDriver::probe`](crate::SyncDriver::probe) does both.
    pub fn new(
        id: usize,
        regs: Arc<dyn RegisterAccess>,
        dma: Arc<dyn DmaAllocator>,
        config: SyncConfig,
    ) -> Self {
        Self {
            id,
            regs,
            dma,
            config,
            rx: StreamEndpoint::new(&config),
            tx: StreamEndpoint::new(&config),
            clients: CriticalSectionCell::new(ClientTable::default()),
        }
    }

    /// Card index within its driver
    pub fn id(&self) -> usize {
        self.id
    }

    /// Configuration the card was created with
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Open a client handle.
    ///
    /// Fails with [`ConfigError::Busy`] once `max_clients` handles are open.
    pub fn open(self: &Arc<Self>) -> ConfigResult<ClientHandle<S>> {
        let max = self.config.max_clients;
        let id = self.clients.with(|table| {
            if table.open >= max {
                return None;
            }
            table.open += 1;
            let id = table.next_id;
            table.next_id = table.next_id.wrapping_add(1);
            Some(ClientId::new(id))
        });
        let id = id.ok_or(ConfigError::Busy)?;
        stream_debug!("sync card {} client {} opened", self.id, id.raw());

        Ok(ClientHandle {
            card: Arc::clone(self),
            id,
            cancel: Arc::new(CancelFlag::new()),
        })
    }

    /// Open client handles
    pub fn open_clients(&self) -> usize {
        self.clients.with_ref(|table| table.open)
    }

    /// Page-flip entry point for the interrupt dispatch.
    ///
    /// Services every synchronous direction present in `bits`, then
    /// acknowledges those sources. Never blocks.
    pub fn handle_interrupt(&self, bits: u32) {
        let status = InterruptStatus::from_raw(bits);
        if status.sync_rx {
            self.rx.service_interrupt(&*self.regs);
        }
        if status.sync_tx {
            self.tx.service_interrupt(&*self.regs);
        }
        if status.any() {
            self.regs.clear_interrupt_status(status.to_raw());
        }
    }

    /// State of one direction
    pub fn state(&self, direction: StreamDirection) -> StreamState {
        match direction {
            StreamDirection::Receive => self.rx.state(),
            StreamDirection::Transmit => self.tx.state(),
        }
    }

    /// Counters of one direction
    pub fn stats(&self, direction: StreamDirection) -> StreamStats {
        match direction {
            StreamDirection::Receive => self.rx.stats(),
            StreamDirection::Transmit => self.tx.stats(),
        }
    }

    /// Clients running in one direction
    pub fn running_clients(&self, direction: StreamDirection) -> usize {
        match direction {
            StreamDirection::Receive => self.rx.client_count(),
            StreamDirection::Transmit => self.tx.client_count(),
        }
    }

    /// Receive endpoint
    pub fn receive(&self) -> &StreamEndpoint<Rx, S> {
        &self.rx
    }

    /// Transmit endpoint
    pub fn transmit(&self) -> &StreamEndpoint<Tx, S> {
        &self.tx
    }

    /// Reset the transceiver chip and wait for it to come ready.
    ///
    /// Refused with [`ConfigError::Busy`] while either direction streams.
    pub fn reset<D: DelayNs>(&self, delay: D) -> ConfigResult<()> {
        if self.rx.state() != StreamState::Idle || self.tx.state() != StreamState::Idle {
            return Err(ConfigError::Busy);
        }
        ResetController::with_timeout(&*self.regs, delay, self.config.reset_timeout_ms).reset()
    }

    /// Stop every client in both directions and release all DMA memory.
    ///
    /// Open handles stay valid; their transfers fail until reconfigured.
    pub fn shutdown(&self) {
        self.rx.shutdown(self.bus(), self.tx.quadlets());
        self.tx.shutdown(self.bus(), 0);
        stream_info!("sync card {} shut down", self.id);
    }

    fn bus(&self) -> Bus<'_> {
        Bus {
            regs: &*self.regs,
            dma: &*self.dma,
        }
    }

    fn configure(
        &self,
        client: ClientId,
        direction: StreamDirection,
        part: FramePart,
    ) -> Result<()> {
        match direction {
            StreamDirection::Receive => {
                self.rx.configure(self.bus(), client, part, self.tx.quadlets())
            }
            StreamDirection::Transmit => {
                self.tx.configure(self.bus(), client, part, self.rx.quadlets())
            }
        }
    }

    fn stop(&self, client: ClientId, direction: StreamDirection) -> bool {
        match direction {
            StreamDirection::Receive => self.rx.stop(self.bus(), client, self.tx.quadlets()),
            StreamDirection::Transmit => self.tx.stop(self.bus(), client, self.rx.quadlets()),
        }
    }

    fn is_running(&self, client: ClientId, direction: StreamDirection) -> bool {
        match direction {
            StreamDirection::Receive => self.rx.is_running(client),
            StreamDirection::Transmit => self.tx.is_running(client),
        }
    }

    fn wake_all(&self) {
        self.rx.wake_all();
        self.tx.wake_all();
    }

    fn close(&self, client: ClientId) {
        for direction in StreamDirection::ALL {
            self.stop(client, direction);
        }
        self.clients.with(|table| table.open = table.open.saturating_sub(1));
        stream_debug!("sync card {} client {} closed", self.id, client.raw());
    }
}

// =============================================================================
// Client Handle
// =============================================================================

/// An open client of a card. Dropping the handle closes it.
pub struct ClientHandle<S: Suspend = DefaultSuspend> {
    card: Arc<SyncCard<S>>,
    id: ClientId,
    cancel: Arc<CancelFlag>,
}

impl<S: Suspend> ClientHandle<S> {
    /// Identity within the card
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Card the handle belongs to
    pub fn card(&self) -> &Arc<SyncCard<S>> {
        &self.card
    }

    /// Start (or reshape) this client's stream in `direction`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidArgument`]: `part` empty or beyond the frame
    /// - [`ConfigError::Busy`]: another configure of `direction` is running
    /// - [`DmaError::OutOfMemory`](crate::DmaError::OutOfMemory): the
    ///   direction dropped to idle and must be configured again
    pub fn configure(&self, direction: StreamDirection, part: FramePart) -> Result<()> {
        self.card.configure(self.id, direction, part)
    }

    /// Read received bytes of this client's frame part.
    ///
    /// Blocks until at least one byte is available.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_with(buf, &mut MemCopy)
    }

    /// [`read`](Self::read) with a caller-supplied copy strategy.
    pub fn read_with(&self, buf: &mut [u8], copy: &mut impl CopyStrategy) -> Result<usize> {
        self.card.rx.read(self.id, buf, &self.cancel, copy)
    }

    /// Queue bytes for transmission in this client's frame part.
    ///
    /// Blocks until every byte is queued.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.write_with(buf, &mut MemCopy)
    }

    /// [`write`](Self::write) with a caller-supplied copy strategy.
    pub fn write_with(&self, buf: &[u8], copy: &mut impl CopyStrategy) -> Result<usize> {
        self.card.tx.write(self.id, buf, &self.cancel, copy)
    }

    /// Stop this client in `direction`. Returns whether it was running.
    pub fn stop(&self, direction: StreamDirection) -> bool {
        self.card.stop(self.id, direction)
    }

    /// Whether this client runs in `direction`
    pub fn is_running(&self, direction: StreamDirection) -> bool {
        self.card.is_running(self.id, direction)
    }

    /// Handle for cancelling this client's blocked calls from elsewhere.
    pub fn interrupter(&self) -> Interrupter<S> {
        Interrupter {
            card: Arc::clone(&self.card),
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// Close the handle, stopping both directions.
    pub fn close(self) {
        drop(self);
    }
}

impl<S: Suspend> Drop for ClientHandle<S> {
    fn drop(&mut self) {
        self.card.close(self.id);
    }
}

/// Cancels a blocked read or write of one client.
///
/// Each [`interrupt`](Self::interrupt) makes one blocked (or the next
/// blocking) call return [`IoError::Interrupted`](crate::IoError::Interrupted).
pub struct Interrupter<S: Suspend = DefaultSuspend> {
    card: Arc<SyncCard<S>>,
    cancel: Arc<CancelFlag>,
}

impl<S: Suspend> Clone for Interrupter<S> {
    fn clone(&self) -> Self {
        Self {
            card: Arc::clone(&self.card),
            cancel: Arc::clone(&self.cancel),
        }
    }
}

impl<S: Suspend> Interrupter<S> {
    /// Request cancellation and wake the client's waiters.
    pub fn interrupt(&self) {
        self.cancel.raise();
        self.card.wake_all();
    }
}
