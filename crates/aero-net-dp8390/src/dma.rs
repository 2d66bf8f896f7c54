//! Remote DMA: the host's byte-counted window into packet memory.
//!
//! The host programs RSAR/RBCR, issues a read, write or send-packet command through CR, and then
//! moves data through the board's data port. Each data-port access advances the cursor by the
//! transfer width; the ring bounds (PSTART/PSTOP) wrap the cursor the same way they wrap
//! receive-side writes.

use tracing::{debug, trace};

use crate::backend::NetworkBackend;
use crate::chip::Dp8390;
use crate::irq::IrqSink;
use crate::regs::{Cr, Isr, RdmaCmd};

/// Remote DMA engine state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RdmaState {
    #[default]
    Idle,
    Reading,
    Writing,
    /// The host aborted a transfer before its byte count reached zero.
    Aborted,
}

impl RdmaState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Reading | Self::Writing)
    }

    #[cfg(feature = "io-snapshot")]
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Reading => 1,
            Self::Writing => 2,
            Self::Aborted => 3,
        }
    }

    #[cfg(feature = "io-snapshot")]
    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Reading),
            2 => Some(Self::Writing),
            3 => Some(Self::Aborted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RemoteDma {
    pub state: RdmaState,
    /// Bytes left before the transfer completes.
    pub remaining: u16,
    /// BNRY value to load once a send-packet transfer completes.
    pub send_next_page: Option<u8>,
}

impl RemoteDma {
    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}

/// Bytes moved per data-port access.
fn access_step(size: u8, word_mode: bool) -> u16 {
    if size >= 4 {
        4
    } else if word_mode {
        2
    } else {
        1
    }
}

fn width_mask(size: u8) -> u32 {
    match size {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => 0xFFFF_FFFF,
    }
}

impl<B: NetworkBackend, I: IrqSink> Dp8390<B, I> {
    pub fn rdma_state(&self) -> RdmaState {
        self.rdma.state
    }

    /// Bytes left in the active remote DMA transfer.
    pub fn rdma_remaining(&self) -> u16 {
        self.rdma.remaining
    }

    pub(crate) fn start_remote_dma(&mut self, cmd: RdmaCmd) {
        let instance = self.config.instance;
        match cmd {
            RdmaCmd::Read => {
                self.regs.remote_dma = self.regs.remote_start;
                self.rdma = RemoteDma {
                    state: RdmaState::Reading,
                    remaining: self.regs.remote_bytes,
                    send_next_page: None,
                };
                if self.regs.remote_bytes == 0 {
                    self.rdma.state = RdmaState::Idle;
                    // Drivers test the interrupt line with an empty remote read.
                    if self.regs.cr.contains(Cr::STA) {
                        trace!(instance, "dp8390: zero-length remote read completes at once");
                        self.regs.isr.insert(Isr::RDC);
                    }
                }
            }
            RdmaCmd::Write => {
                self.regs.remote_dma = self.regs.remote_start;
                self.rdma = RemoteDma {
                    state: RdmaState::Writing,
                    remaining: self.regs.remote_bytes,
                    send_next_page: None,
                };
                if self.regs.remote_bytes == 0 {
                    debug!(instance, "dp8390: remote write with zero byte count");
                    self.rdma.state = RdmaState::Idle;
                }
            }
            RdmaCmd::SendPacket => {
                let base = u16::from(self.regs.bound_ptr) << 8;
                let next_page = self.mem.read_u8(u32::from(base) + 1);
                let count = self.mem.chipmem_read(u32::from(base) + 2, 2) as u16;
                trace!(
                    instance,
                    addr = base,
                    count,
                    next_page,
                    "dp8390: send packet command"
                );
                self.regs.remote_start = base;
                self.regs.remote_dma = base;
                self.regs.remote_bytes = count;
                self.rdma = RemoteDma {
                    state: RdmaState::Reading,
                    remaining: count,
                    send_next_page: Some(next_page),
                };
                if count == 0 {
                    debug!(instance, "dp8390: send packet at an empty ring header");
                    self.rdma.cancel();
                }
            }
            RdmaCmd::Abort => {
                if self.rdma.state.is_active() {
                    debug!(
                        instance,
                        remaining = self.rdma.remaining,
                        "dp8390: remote DMA aborted"
                    );
                    self.rdma = RemoteDma {
                        state: RdmaState::Aborted,
                        remaining: 0,
                        send_next_page: None,
                    };
                }
            }
        }
    }

    /// Reads from the board's data port.
    ///
    /// Outside a remote read the port floats and reads back all ones.
    pub fn data_read(&mut self, size: u8) -> u32 {
        if size == 0 {
            return 0;
        }
        if self.rdma.state != RdmaState::Reading {
            trace!(
                instance = self.config.instance,
                state = ?self.rdma.state,
                "dp8390: data port read without remote read"
            );
            return width_mask(size);
        }

        let step = access_step(size, self.regs.dcr.word_mode());
        let mut value = 0u32;
        for i in 0..step {
            let byte = self.mem.read_u8(u32::from(self.regs.remote_dma));
            value |= u32::from(byte) << (8 * u32::from(i));
            self.advance_remote_dma();
        }
        self.finish_data_access(step);
        value & width_mask(size)
    }

    /// Writes to the board's data port. Ignored outside a remote write.
    pub fn data_write(&mut self, size: u8, value: u32) {
        if size == 0 {
            return;
        }
        if self.rdma.state != RdmaState::Writing {
            trace!(
                instance = self.config.instance,
                state = ?self.rdma.state,
                value,
                "dp8390: data port write without remote write"
            );
            return;
        }

        let step = access_step(size, self.regs.dcr.word_mode());
        for i in 0..step {
            let byte = (value >> (8 * u32::from(i))) as u8;
            self.mem.write_u8(u32::from(self.regs.remote_dma), byte);
            self.advance_remote_dma();
        }
        self.finish_data_access(step);
    }

    fn advance_remote_dma(&mut self) {
        let regs = &mut self.regs;
        regs.remote_dma = regs.remote_dma.wrapping_add(1);
        if regs.page_stop > regs.page_start && regs.remote_dma == u16::from(regs.page_stop) << 8 {
            regs.remote_dma = u16::from(regs.page_start) << 8;
        }
    }

    fn finish_data_access(&mut self, step: u16) {
        self.rdma.remaining = self.rdma.remaining.saturating_sub(step);
        if self.rdma.remaining == 0 {
            trace!(
                instance = self.config.instance,
                addr = self.regs.remote_dma,
                "dp8390: remote DMA complete"
            );
            self.rdma.state = RdmaState::Idle;
            self.regs.isr.insert(Isr::RDC);
            if let Some(next_page) = self.rdma.send_next_page.take() {
                self.regs.bound_ptr = next_page;
                self.regs.rempkt_ptr = next_page;
            }
        }
        self.update_irq();
    }
}
