//! Synchronization and Concurrency Support
//!
//! - **Primitives** (`primitives`): [`CriticalSectionCell`] for state shared
//!   between client threads and the page-flip handler
//! - **Suspension** ([`suspend`]): the pluggable blocking primitive
//!   ([`Suspend`]) and one-shot [`CancelFlag`]
//! - **Quiesce** ([`reconfigure`]): [`ReconfigureLock`], which drains
//!   in-flight reads and writes before a stream is reprogrammed
//!
//! # Feature Flags
//!
//! - `std`: [`DefaultSuspend`] is the condition-variable implementation;
//!   without it waiters spin on a generation counter.

mod primitives;
pub mod reconfigure;
pub mod suspend;

pub use primitives::CriticalSectionCell;
pub use reconfigure::{IoGuard, ReconfigureGuard, ReconfigureLock};
#[cfg(feature = "std")]
pub use suspend::CondvarSuspend;
pub use suspend::{CancelFlag, DefaultSuspend, SpinSuspend, Suspend};
