//! Card registry.
//!
//! [`SyncDriver`] brings cards up (chip reset, interrupt sources masked and
//! acknowledged, page-flip handler registered) and tears them down again.
//! It holds at most [`MAX_CARDS`] cards.

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};

use embedded_hal::delay::DelayNs;

use super::card::SyncCard;
use super::config::SyncConfig;
use crate::error::{ConfigError, ConfigResult, Result};
use crate::hal::dma::DmaAllocator;
use crate::hal::registers::{InterruptDispatch, RegisterAccess};
use crate::hal::reset::ResetController;
use crate::internal::constants::MAX_CARDS;
use crate::internal::log::{stream_info, stream_warn};
use crate::internal::register::IRQ_SYNC_ALL;
use crate::sync::{DefaultSuspend, Suspend};

/// Interrupt plumbing shared with the platform
pub type SharedDispatch = Arc<dyn InterruptDispatch + Send + Sync>;

struct Slot<S: Suspend> {
    card: Arc<SyncCard<S>>,
    dispatch: SharedDispatch,
}

/// Registry of probed cards.
pub struct SyncDriver<S: Suspend = DefaultSuspend> {
    config: SyncConfig,
    slots: [Option<Slot<S>>; MAX_CARDS],
}

impl<S: Suspend + 'static> SyncDriver<S> {
    /// Create an empty registry.
    ///
    /// Fails with [`ConfigError::InvalidConfig`] if `config` does not
    /// validate.
    pub fn new(config: SyncConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            slots: [const { None }; MAX_CARDS],
        })
    }

    /// Configuration handed to every probed card
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Bring up a card and register its page-flip handler.
    ///
    /// The chip is reset, both synchronous interrupt sources are masked and
    /// acknowledged, and only then is the handler installed. Streams stay
    /// idle until a client configures them.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::CardSlotsExhausted`]: every slot is taken
    /// - [`ConfigError::ResetFailed`]: the chip did not come ready
    /// - [`IoError`](crate::IoError): the handler could not be registered
    pub fn probe<D: DelayNs>(
        &mut self,
        regs: Arc<dyn RegisterAccess>,
        dma: Arc<dyn DmaAllocator>,
        dispatch: SharedDispatch,
        delay: D,
    ) -> Result<Arc<SyncCard<S>>> {
        let id = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ConfigError::CardSlotsExhausted)?;

        ResetController::with_timeout(&*regs, delay, self.config.reset_timeout_ms).reset()?;
        regs.set_interrupt_mask(0, IRQ_SYNC_ALL);
        regs.clear_interrupt_status(IRQ_SYNC_ALL);

        let card = Arc::new(SyncCard::new(id, regs, dma, self.config));
        let weak: Weak<SyncCard<S>> = Arc::downgrade(&card);
        dispatch.on_interrupt(
            IRQ_SYNC_ALL,
            Box::new(move |bits| {
                if let Some(card) = weak.upgrade() {
                    card.handle_interrupt(bits);
                }
            }),
        )?;

        self.slots[id] = Some(Slot {
            card: Arc::clone(&card),
            dispatch,
        });
        stream_info!("sync card {} probed", id);
        Ok(card)
    }

    /// Card registered under `id`
    pub fn card(&self, id: usize) -> Option<&Arc<SyncCard<S>>> {
        self.slots.get(id)?.as_ref().map(|slot| &slot.card)
    }

    /// Registered cards
    pub fn card_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Unregister a card: release its interrupt handler, then stop every
    /// stream and free its DMA memory.
    pub fn remove(&mut self, id: usize) -> ConfigResult<()> {
        let slot = self
            .slots
            .get_mut(id)
            .and_then(Option::take)
            .ok_or(ConfigError::UnknownCard)?;
        slot.dispatch.release(IRQ_SYNC_ALL);
        slot.card.shutdown();
        if Arc::strong_count(&slot.card) > 1 {
            stream_warn!("sync card {} removed with clients still open", id);
        }
        Ok(())
    }

    /// Remove every card.
    pub fn shutdown(&mut self) {
        for id in 0..MAX_CARDS {
            let _ = self.remove(id);
        }
    }
}

impl<S: Suspend> Drop for SyncDriver<S> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut().filter_map(Option::take) {
            slot.dispatch.release(IRQ_SYNC_ALL);
            slot.card.shutdown();
        }
    }
}
