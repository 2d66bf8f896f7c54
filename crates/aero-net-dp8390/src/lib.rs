//! DP8390 network interface controller core.
//!
//! This is the chip shared by the NE1000/NE2000, WD8003 and 3C503 adapters: a paged register
//! file, on-chip packet memory holding the receive ring and transmit buffers, a remote DMA window
//! through which the host reaches that memory, and level-sensitive interrupt status.
//!
//! Board models own the I/O decode and forward register accesses to [`Dp8390::read`] /
//! [`Dp8390::write`] and their data port to [`Dp8390::data_read`] / [`Dp8390::data_write`].
//! Frames leave through a [`NetworkBackend`]; interrupts are reported through an [`IrqSink`].
#![forbid(unsafe_code)]

pub mod backend;
mod chip;
pub mod config;
pub mod device;
pub mod dma;
pub mod error;
pub mod irq;
pub mod memory;
pub mod regs;
pub mod rx;
#[cfg(feature = "io-snapshot")]
pub mod snapshot;
pub mod time;
pub mod tx;

pub use backend::{FrameQueue, NetworkBackend, QueueBackend, DEFAULT_MAX_FRAMES_PER_POLL};
pub use chip::Dp8390;
pub use config::{Dp8390Config, PacketMemoryLayout, TxTiming};
pub use dma::RdmaState;
pub use error::ConfigError;
#[cfg(feature = "io-snapshot")]
pub use error::{SnapshotError, SnapshotResult};
pub use irq::IrqSink;
pub use memory::{PacketMemory, PROM_SIGNATURE};
pub use rx::{multicast_hash_index, RxErrors, MAX_FRAME_LEN, MIN_FRAME_LEN};
#[cfg(feature = "io-snapshot")]
pub use snapshot::{IoSnapshot, SnapshotVersion};
